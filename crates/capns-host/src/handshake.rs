// SPDX-License-Identifier: MIT OR Apache-2.0
//! The HELLO/HELLO exchange that establishes negotiated [`Limits`] and
//! retrieves the plugin's manifest before any request is issued.

use std::collections::BTreeMap;

use capns_frame::{Frame, FrameId, FrameType};
use capns_transport::{FrameReader, FrameWriter, Limits};
use ciborium::Value;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::HostError;

const PROTOCOL_VERSION: u8 = 2;

fn limits_to_meta(limits: Limits) -> BTreeMap<String, Value> {
    let mut meta = BTreeMap::new();
    meta.insert("version".to_owned(), Value::Integer(i64::from(PROTOCOL_VERSION).into()));
    meta.insert("max_frame".to_owned(), Value::Integer(limits.max_frame.into()));
    meta.insert("max_chunk".to_owned(), Value::Integer(limits.max_chunk.into()));
    if let Some(max_reorder_buffer) = limits.max_reorder_buffer {
        meta.insert(
            "max_reorder_buffer".to_owned(),
            Value::Integer(max_reorder_buffer.into()),
        );
    }
    meta
}

fn meta_u64(meta: &BTreeMap<String, Value>, key: &str) -> Option<u64> {
    meta.get(key).and_then(Value::as_integer).and_then(|i| u64::try_from(i).ok())
}

/// Perform the host side of the handshake: send our proposed limits
/// (manifest-less HELLO), read the plugin's HELLO (limits + required
/// manifest), and return the negotiated limits and raw manifest bytes.
///
/// # Errors
///
/// [`HostError::HandshakeFailed`] if the plugin's first frame isn't
/// `HELLO`, is missing a limit field, or is missing its required
/// `manifest` byte-string.
pub async fn host_handshake<R, W>(
    reader: &mut FrameReader<R>,
    writer: &FrameWriter<W>,
    proposed: Limits,
) -> Result<(Limits, Vec<u8>), HostError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let hello = Frame::new(PROTOCOL_VERSION, FrameType::Hello, FrameId::Number(0), 0)
        .with_payload("application/cbor", Vec::new());
    let mut hello = hello;
    hello.meta = Some(limits_to_meta(proposed));
    writer
        .write_frame(&hello)
        .await
        .map_err(|err| HostError::HandshakeFailed(err.to_string()))?;

    let reply = reader
        .read_frame()
        .await
        .map_err(|err| HostError::HandshakeFailed(err.to_string()))?
        .ok_or_else(|| HostError::HandshakeFailed("plugin closed before HELLO".to_owned()))?;

    if reply.frame_type != FrameType::Hello {
        return Err(HostError::HandshakeFailed(format!(
            "expected HELLO, got {:?}",
            reply.frame_type
        )));
    }
    let meta = reply
        .meta
        .ok_or_else(|| HostError::HandshakeFailed("plugin HELLO missing meta".to_owned()))?;

    let manifest = match meta.get("manifest") {
        Some(Value::Bytes(bytes)) => bytes.clone(),
        _ => return Err(HostError::HandshakeFailed("plugin HELLO missing manifest".to_owned())),
    };
    let their_max_frame =
        meta_u64(&meta, "max_frame").ok_or_else(|| HostError::HandshakeFailed("missing max_frame".to_owned()))?;
    let their_max_chunk =
        meta_u64(&meta, "max_chunk").ok_or_else(|| HostError::HandshakeFailed("missing max_chunk".to_owned()))?;
    let their_max_reorder_buffer = meta_u64(&meta, "max_reorder_buffer");

    let theirs = Limits {
        max_frame: their_max_frame,
        max_chunk: their_max_chunk,
        max_reorder_buffer: their_max_reorder_buffer,
    };
    Ok((Limits::negotiate(proposed, theirs), manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use capns_transport::SharedLimits;

    #[tokio::test]
    async fn negotiates_limits_and_returns_manifest() {
        let (mut client, mut server) = tokio::io::duplex(8192);

        let plugin_side = tokio::spawn(async move {
            let shared = SharedLimits::default();
            let mut reader = FrameReader::new(&mut server, shared.clone());
            let writer = FrameWriter::new(&mut server, shared);
            let incoming = reader.read_frame().await.unwrap().unwrap();
            assert_eq!(incoming.frame_type, FrameType::Hello);

            let mut meta = BTreeMap::new();
            meta.insert("manifest".to_owned(), Value::Bytes(b"{\"name\":\"demo\"}".to_vec()));
            meta.insert("max_frame".to_owned(), Value::Integer(1000.into()));
            meta.insert("max_chunk".to_owned(), Value::Integer(50.into()));
            let mut reply = Frame::new(PROTOCOL_VERSION, FrameType::Hello, FrameId::Number(0), 0);
            reply.meta = Some(meta);
            writer.write_frame(&reply).await.unwrap();
        });

        let shared = SharedLimits::default();
        let mut reader = FrameReader::new(&mut client, shared.clone());
        let writer = FrameWriter::new(&mut client, shared);
        let proposed = Limits {
            max_frame: 2000,
            max_chunk: 100,
            max_reorder_buffer: None,
        };
        let (negotiated, manifest) = host_handshake(&mut reader, &writer, proposed).await.unwrap();
        plugin_side.await.unwrap();

        assert_eq!(negotiated.max_frame, 1000);
        assert_eq!(negotiated.max_chunk, 50);
        assert_eq!(manifest, b"{\"name\":\"demo\"}");
    }

    #[tokio::test]
    async fn missing_manifest_is_handshake_failure() {
        let (mut client, mut server) = tokio::io::duplex(8192);

        let plugin_side = tokio::spawn(async move {
            let shared = SharedLimits::default();
            let mut reader = FrameReader::new(&mut server, shared.clone());
            let writer = FrameWriter::new(&mut server, shared);
            let _ = reader.read_frame().await.unwrap().unwrap();
            let mut meta = BTreeMap::new();
            meta.insert("max_frame".to_owned(), Value::Integer(1000.into()));
            meta.insert("max_chunk".to_owned(), Value::Integer(50.into()));
            let mut reply = Frame::new(PROTOCOL_VERSION, FrameType::Hello, FrameId::Number(0), 0);
            reply.meta = Some(meta);
            writer.write_frame(&reply).await.unwrap();
        });

        let shared = SharedLimits::default();
        let mut reader = FrameReader::new(&mut client, shared.clone());
        let writer = FrameWriter::new(&mut client, shared);
        let err = host_handshake(&mut reader, &writer, Limits::default()).await.unwrap_err();
        plugin_side.await.unwrap();
        assert!(matches!(err, HostError::HandshakeFailed(_)));
    }
}
