// SPDX-License-Identifier: MIT OR Apache-2.0
//! Building and parsing the two relay control-plane frame types: `RELAY_NOTIFY`
//! (a slave announcing its manifest and proposed limits to its master) and
//! `RELAY_STATE` (a master pushing opaque telemetry down to its slave).

use std::collections::BTreeMap;

use capns_frame::{Frame, FrameId, FrameType};
use capns_transport::Limits;
use ciborium::Value;

use crate::RelayError;

fn meta_u64(meta: &BTreeMap<String, Value>, key: &str) -> Option<u64> {
    meta.get(key).and_then(Value::as_integer).and_then(|i| u64::try_from(i).ok())
}

pub(crate) fn relay_notify_frame(manifest: Vec<u8>, limits: Limits) -> Frame {
    let mut meta = BTreeMap::new();
    meta.insert("manifest".to_owned(), Value::Bytes(manifest));
    meta.insert("max_frame".to_owned(), Value::Integer(limits.max_frame.into()));
    meta.insert("max_chunk".to_owned(), Value::Integer(limits.max_chunk.into()));
    if let Some(max_reorder_buffer) = limits.max_reorder_buffer {
        meta.insert("max_reorder_buffer".to_owned(), Value::Integer(max_reorder_buffer.into()));
    }
    let mut frame = Frame::new(2, FrameType::RelayNotify, FrameId::Number(0), 0);
    frame.meta = Some(meta);
    frame
}

pub(crate) fn parse_relay_notify(frame: &Frame) -> Result<(Vec<u8>, Limits), RelayError> {
    let meta = frame
        .meta
        .as_ref()
        .ok_or_else(|| RelayError::HandshakeFailed("RELAY_NOTIFY missing meta".to_owned()))?;
    let manifest = match meta.get("manifest") {
        Some(Value::Bytes(bytes)) => bytes.clone(),
        _ => return Err(RelayError::HandshakeFailed("RELAY_NOTIFY missing manifest".to_owned())),
    };
    let max_frame =
        meta_u64(meta, "max_frame").ok_or_else(|| RelayError::HandshakeFailed("RELAY_NOTIFY missing max_frame".to_owned()))?;
    let max_chunk =
        meta_u64(meta, "max_chunk").ok_or_else(|| RelayError::HandshakeFailed("RELAY_NOTIFY missing max_chunk".to_owned()))?;
    let max_reorder_buffer = meta_u64(meta, "max_reorder_buffer");
    Ok((
        manifest,
        Limits {
            max_frame,
            max_chunk,
            max_reorder_buffer,
        },
    ))
}

/// Build a `RELAY_STATE` frame carrying an opaque, caller-supplied
/// telemetry map (spec.md §4.K: `Master::sendState`).
#[must_use]
pub fn relay_state_frame(resources: BTreeMap<String, Value>) -> Frame {
    let mut frame = Frame::new(2, FrameType::RelayState, FrameId::Number(0), 0);
    frame.meta = Some(resources);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_round_trips_manifest_and_limits() {
        let limits = Limits {
            max_frame: 1024,
            max_chunk: 256,
            max_reorder_buffer: Some(8),
        };
        let frame = relay_notify_frame(b"manifest-bytes".to_vec(), limits);
        let (manifest, parsed) = parse_relay_notify(&frame).unwrap();
        assert_eq!(manifest, b"manifest-bytes");
        assert_eq!(parsed, limits);
    }

    #[test]
    fn notify_without_reorder_buffer_omits_it() {
        let limits = Limits {
            max_frame: 1024,
            max_chunk: 256,
            max_reorder_buffer: None,
        };
        let frame = relay_notify_frame(b"m".to_vec(), limits);
        let (_, parsed) = parse_relay_notify(&frame).unwrap();
        assert_eq!(parsed.max_reorder_buffer, None);
    }

    #[test]
    fn notify_missing_manifest_errors() {
        let mut frame = Frame::new(2, FrameType::RelayNotify, FrameId::Number(0), 0);
        let mut meta = BTreeMap::new();
        meta.insert("max_frame".to_owned(), Value::Integer(1.into()));
        meta.insert("max_chunk".to_owned(), Value::Integer(1.into()));
        frame.meta = Some(meta);
        assert!(parse_relay_notify(&frame).is_err());
    }
}
