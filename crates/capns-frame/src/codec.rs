// SPDX-License-Identifier: MIT OR Apache-2.0
//! CBOR encoding/decoding of [`Frame`]s as an integer-keyed map, plus
//! length-prefix framing over a byte buffer.

use std::collections::BTreeMap;

use ciborium::Value;

use crate::frame::{Frame, FrameId, FrameType};
use crate::FrameError;

/// Hard upper bound on an encoded frame's CBOR body, independent of any
/// negotiated `max_frame` (spec §3's "hard upper bound").
pub const HARD_FRAME_LIMIT: usize = 16 * 1024 * 1024;

const KEY_VERSION: i64 = 0;
const KEY_FRAME_TYPE: i64 = 1;
const KEY_ID: i64 = 2;
const KEY_SEQ: i64 = 3;
const KEY_CONTENT_TYPE: i64 = 4;
const KEY_META: i64 = 5;
const KEY_PAYLOAD: i64 = 6;
const KEY_LEN: i64 = 7;
const KEY_OFFSET: i64 = 8;
const KEY_EOF: i64 = 9;
const KEY_CAP: i64 = 10;
const KEY_STREAM_ID: i64 = 11;
const KEY_MEDIA_URN: i64 = 12;

/// Encode `frame` to its raw CBOR body (no length prefix).
///
/// # Errors
///
/// [`FrameError::FrameTooLarge`] if the encoded body exceeds
/// [`HARD_FRAME_LIMIT`]; [`FrameError::Encode`] on a CBOR encoding failure.
pub fn encode(frame: &Frame) -> Result<Vec<u8>, FrameError> {
    let mut entries: Vec<(Value, Value)> = vec![
        (Value::Integer(KEY_VERSION.into()), Value::Integer(i64::from(frame.version).into())),
        (
            Value::Integer(KEY_FRAME_TYPE.into()),
            Value::Integer(i64::from(frame.frame_type.code()).into()),
        ),
        (Value::Integer(KEY_ID.into()), frame.id.to_cbor_value()),
        (Value::Integer(KEY_SEQ.into()), Value::Integer(i64::from(frame.seq).into())),
    ];
    if let Some(ct) = &frame.content_type {
        entries.push((Value::Integer(KEY_CONTENT_TYPE.into()), Value::Text(ct.clone())));
    }
    if let Some(meta) = &frame.meta {
        let map = meta
            .iter()
            .map(|(k, v)| (Value::Text(k.clone()), v.clone()))
            .collect();
        entries.push((Value::Integer(KEY_META.into()), Value::Map(map)));
    }
    if let Some(payload) = &frame.payload {
        entries.push((Value::Integer(KEY_PAYLOAD.into()), Value::Bytes(payload.clone())));
    }
    if let Some(len) = frame.len {
        entries.push((Value::Integer(KEY_LEN.into()), Value::Integer(len.into())));
    }
    if let Some(offset) = frame.offset {
        entries.push((Value::Integer(KEY_OFFSET.into()), Value::Integer(offset.into())));
    }
    if let Some(eof) = frame.eof {
        entries.push((Value::Integer(KEY_EOF.into()), Value::Bool(eof)));
    }
    if let Some(cap) = &frame.cap {
        entries.push((Value::Integer(KEY_CAP.into()), Value::Text(cap.clone())));
    }
    if let Some(stream_id) = &frame.stream_id {
        entries.push((Value::Integer(KEY_STREAM_ID.into()), Value::Text(stream_id.clone())));
    }
    if let Some(media_urn) = &frame.media_urn {
        entries.push((Value::Integer(KEY_MEDIA_URN.into()), Value::Text(media_urn.clone())));
    }

    let mut body = Vec::new();
    ciborium::into_writer(&Value::Map(entries), &mut body)
        .map_err(|err| FrameError::Encode(err.to_string()))?;
    if body.len() > HARD_FRAME_LIMIT {
        return Err(FrameError::FrameTooLarge {
            size: body.len(),
            limit: HARD_FRAME_LIMIT,
        });
    }
    Ok(body)
}

/// Decode a [`Frame`] from its raw CBOR body (no length prefix).
///
/// # Errors
///
/// [`FrameError::InvalidFrame`] if the body isn't a CBOR map, a required
/// key is missing, or a key's value has the wrong type.
pub fn decode(body: &[u8]) -> Result<Frame, FrameError> {
    let value: Value = ciborium::from_reader(body)
        .map_err(|err| FrameError::InvalidFrame(format!("malformed cbor: {err}")))?;
    let Value::Map(entries) = value else {
        return Err(FrameError::InvalidFrame("frame body is not a cbor map".to_owned()));
    };

    let get = |key: i64| -> Option<&Value> {
        entries.iter().find_map(|(k, v)| match k {
            Value::Integer(i) if i64::try_from(*i).ok() == Some(key) => Some(v),
            _ => None,
        })
    };

    let version = get(KEY_VERSION)
        .and_then(Value::as_integer)
        .and_then(|i| u8::try_from(i).ok())
        .ok_or_else(|| FrameError::InvalidFrame("missing or invalid `version`".to_owned()))?;
    if !matches!(version, 1 | 2) {
        return Err(FrameError::InvalidFrame(format!(
            "unsupported protocol version {version}"
        )));
    }

    let frame_type_code = get(KEY_FRAME_TYPE)
        .and_then(Value::as_integer)
        .and_then(|i| u8::try_from(i).ok())
        .ok_or_else(|| FrameError::InvalidFrame("missing or invalid `frame_type`".to_owned()))?;
    if frame_type_code == 2 {
        return Err(FrameError::InvalidFrame("frame_type RES(2) is reserved".to_owned()));
    }
    let frame_type = FrameType::from_code(frame_type_code)
        .ok_or_else(|| FrameError::InvalidFrame(format!("unknown frame_type {frame_type_code}")))?;

    let id = get(KEY_ID)
        .and_then(FrameId::from_cbor_value)
        .ok_or_else(|| FrameError::InvalidFrame("missing or invalid `id`".to_owned()))?;

    let seq = get(KEY_SEQ)
        .and_then(Value::as_integer)
        .and_then(|i| u32::try_from(i).ok())
        .ok_or_else(|| FrameError::InvalidFrame("missing or invalid `seq`".to_owned()))?;

    let content_type = match get(KEY_CONTENT_TYPE) {
        Some(Value::Text(s)) => Some(s.clone()),
        Some(_) => return Err(FrameError::InvalidFrame("`content_type` must be text".to_owned())),
        None => None,
    };

    let meta = match get(KEY_META) {
        Some(Value::Map(entries)) => {
            let mut map = BTreeMap::new();
            for (k, v) in entries {
                let Value::Text(key) = k else {
                    return Err(FrameError::InvalidFrame("`meta` keys must be text".to_owned()));
                };
                map.insert(key.clone(), v.clone());
            }
            Some(map)
        }
        Some(_) => return Err(FrameError::InvalidFrame("`meta` must be a map".to_owned())),
        None => None,
    };

    let payload = match get(KEY_PAYLOAD) {
        Some(Value::Bytes(b)) => Some(b.clone()),
        Some(_) => return Err(FrameError::InvalidFrame("`payload` must be bytes".to_owned())),
        None => None,
    };

    let len = match get(KEY_LEN) {
        Some(v) => Some(
            v.as_integer()
                .and_then(|i| u64::try_from(i).ok())
                .ok_or_else(|| FrameError::InvalidFrame("`len` must be a non-negative integer".to_owned()))?,
        ),
        None => None,
    };

    let offset = match get(KEY_OFFSET) {
        Some(v) => Some(
            v.as_integer()
                .and_then(|i| u64::try_from(i).ok())
                .ok_or_else(|| FrameError::InvalidFrame("`offset` must be a non-negative integer".to_owned()))?,
        ),
        None => None,
    };

    let eof = match get(KEY_EOF) {
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => return Err(FrameError::InvalidFrame("`eof` must be a bool".to_owned())),
        None => None,
    };

    let cap = match get(KEY_CAP) {
        Some(Value::Text(s)) => Some(s.clone()),
        Some(_) => return Err(FrameError::InvalidFrame("`cap` must be text".to_owned())),
        None => None,
    };

    let stream_id = match get(KEY_STREAM_ID) {
        Some(Value::Text(s)) => Some(s.clone()),
        Some(_) => return Err(FrameError::InvalidFrame("`stream_id` must be text".to_owned())),
        None => None,
    };

    let media_urn = match get(KEY_MEDIA_URN) {
        Some(Value::Text(s)) => Some(s.clone()),
        Some(_) => return Err(FrameError::InvalidFrame("`media_urn` must be text".to_owned())),
        None => None,
    };

    Ok(Frame {
        version,
        frame_type,
        id,
        seq,
        content_type,
        meta,
        payload,
        len,
        offset,
        eof,
        cap,
        stream_id,
        media_urn,
    })
}

/// Encode `frame` as a length-prefixed wire packet: a big-endian `u32`
/// byte count followed by the CBOR body.
///
/// # Errors
///
/// See [`encode`].
pub fn encode_framed(frame: &Frame) -> Result<Vec<u8>, FrameError> {
    let body = encode(frame)?;
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode one length-prefixed frame from the front of `buf`, returning the
/// frame and the number of bytes consumed. Returns `Ok(None)` if `buf`
/// doesn't yet contain a complete frame.
///
/// # Errors
///
/// See [`decode`]; [`FrameError::FrameTooLarge`] if the declared length
/// exceeds [`HARD_FRAME_LIMIT`].
pub fn decode_framed(buf: &[u8]) -> Result<Option<(Frame, usize)>, FrameError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let declared_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if declared_len > HARD_FRAME_LIMIT {
        return Err(FrameError::FrameTooLarge {
            size: declared_len,
            limit: HARD_FRAME_LIMIT,
        });
    }
    if buf.len() < 4 + declared_len {
        return Ok(None);
    }
    let frame = decode(&buf[4..4 + declared_len])?;
    Ok(Some((frame, 4 + declared_len)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_frame() -> Frame {
        Frame::new(2, FrameType::Req, FrameId::Uuid(Uuid::nil()), 0)
            .with_cap("cap:in=media:pdf;out=\"media:image;png\"")
            .with_payload("application/pdf", vec![1, 2, 3])
    }

    #[test]
    fn round_trips_through_cbor() {
        let frame = sample_frame();
        let body = encode(&frame).unwrap();
        let decoded = decode(&body).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn round_trips_through_length_prefix() {
        let frame = sample_frame();
        let wire = encode_framed(&frame).unwrap();
        let (decoded, consumed) = decode_framed(&wire).unwrap().unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decode_framed_reports_incomplete_as_none() {
        let frame = sample_frame();
        let wire = encode_framed(&frame).unwrap();
        assert_eq!(decode_framed(&wire[..2]).unwrap(), None);
        assert_eq!(decode_framed(&wire[..wire.len() - 1]).unwrap(), None);
    }

    #[test]
    fn decode_rejects_reserved_res_type() {
        let mut entries = vec![
            (Value::Integer(KEY_VERSION.into()), Value::Integer(2.into())),
            (Value::Integer(KEY_FRAME_TYPE.into()), Value::Integer(2.into())),
            (Value::Integer(KEY_ID.into()), Value::Integer(1.into())),
            (Value::Integer(KEY_SEQ.into()), Value::Integer(0.into())),
        ];
        entries.sort_by_key(|_| 0); // stable; order is irrelevant to decode
        let mut body = Vec::new();
        ciborium::into_writer(&Value::Map(entries), &mut body).unwrap();
        let err = decode(&body).unwrap_err();
        assert!(matches!(err, FrameError::InvalidFrame(_)));
    }

    #[test]
    fn decode_rejects_version_zero_and_unknown() {
        for bad_version in [0, 3, 255] {
            let entries = vec![
                (Value::Integer(KEY_VERSION.into()), Value::Integer(bad_version.into())),
                (Value::Integer(KEY_FRAME_TYPE.into()), Value::Integer(7.into())),
                (Value::Integer(KEY_ID.into()), Value::Integer(1.into())),
                (Value::Integer(KEY_SEQ.into()), Value::Integer(0.into())),
            ];
            let mut body = Vec::new();
            ciborium::into_writer(&Value::Map(entries), &mut body).unwrap();
            let err = decode(&body).unwrap_err();
            assert!(matches!(err, FrameError::InvalidFrame(_)));
        }
    }

    #[test]
    fn decode_accepts_legacy_version_one() {
        let entries = vec![
            (Value::Integer(KEY_VERSION.into()), Value::Integer(1.into())),
            (Value::Integer(KEY_FRAME_TYPE.into()), Value::Integer(7.into())),
            (Value::Integer(KEY_ID.into()), Value::Integer(1.into())),
            (Value::Integer(KEY_SEQ.into()), Value::Integer(0.into())),
        ];
        let mut body = Vec::new();
        ciborium::into_writer(&Value::Map(entries), &mut body).unwrap();
        let decoded = decode(&body).unwrap();
        assert_eq!(decoded.version, 1);
    }

    #[test]
    fn decode_rejects_missing_required_field() {
        let entries = vec![(Value::Integer(KEY_VERSION.into()), Value::Integer(2.into()))];
        let mut body = Vec::new();
        ciborium::into_writer(&Value::Map(entries), &mut body).unwrap();
        let err = decode(&body).unwrap_err();
        assert!(matches!(err, FrameError::InvalidFrame(_)));
    }

    #[test]
    fn heartbeat_uses_numeric_id() {
        let frame = Frame::new(2, FrameType::Heartbeat, FrameId::Number(42), 0);
        let body = encode(&frame).unwrap();
        let decoded = decode(&body).unwrap();
        assert_eq!(decoded.id, FrameId::Number(42));
    }

    #[test]
    fn frame_exceeding_hard_limit_is_rejected() {
        let frame = Frame::new(2, FrameType::Chunk, FrameId::Number(1), 0)
            .with_payload("application/octet-stream", vec![0u8; HARD_FRAME_LIMIT + 1]);
        let err = encode(&frame).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
    }
}
