// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared helpers for `capns-relay-cli`: turning a typed stdin line into a
//! `REQ` frame, and reassembling the `CHUNK`/`END`/`ERR` frames a
//! [`capns_relay::Switch`] hands back to its engine into one printable
//! result per request id.

use std::collections::HashMap;

use capns_frame::{Frame, FrameId, FrameType};
use capns_urn::CapUrn;
use uuid::Uuid;

/// One line of engine input: `<cap-urn> <text>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    /// The cap urn to route to.
    pub cap_urn: CapUrn,
    /// The text payload to send.
    pub text: String,
}

/// A line failed to parse as a [`RequestLine`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RequestLineError {
    /// The line had no space separating a cap urn from its text.
    #[error("expected \"<cap-urn> <text>\", got: {0}")]
    Malformed(String),
    /// The cap urn half didn't parse.
    #[error("bad cap urn: {0}")]
    BadUrn(String),
}

/// Parse one engine-input line.
///
/// # Errors
///
/// [`RequestLineError`] if the line has no cap-urn/text split, or the
/// cap-urn half doesn't parse.
pub fn parse_request_line(line: &str) -> Result<RequestLine, RequestLineError> {
    let (urn_text, text) = line.trim().split_once(' ').ok_or_else(|| RequestLineError::Malformed(line.to_owned()))?;
    let cap_urn = CapUrn::parse(urn_text).map_err(|err| RequestLineError::BadUrn(err.to_string()))?;
    Ok(RequestLine {
        cap_urn,
        text: text.to_owned(),
    })
}

/// Build the inline-payload `REQ` frame a [`RequestLine`] becomes.
#[must_use]
pub fn request_frame(id: Uuid, line: &RequestLine) -> Frame {
    Frame::new(2, FrameType::Req, FrameId::Uuid(id), 0)
        .with_cap(line.cap_urn.to_string())
        .with_payload("text/plain", line.text.clone().into_bytes())
}

/// One request's outcome, once its `END` or `ERR` frame has arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The handler's output, concatenated in arrival order.
    Ok(Vec<u8>),
    /// The handler (or the switch itself) reported a terminal error.
    Err(String),
}

/// Accumulates `CHUNK` payloads per request id until an `END`/`ERR`
/// closes it out, the way a one-shot request/response client sitting on
/// top of the chunked wire protocol has to.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    buffers: HashMap<Uuid, Vec<u8>>,
}

impl ResponseAssembler {
    /// Fresh assembler with no requests in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame routed back to the engine. Returns the finished
    /// outcome once `frame` is the terminal `END`/`ERR` for its request;
    /// `None` for every frame before that (`CHUNK`s accumulate silently,
    /// anything else is ignored).
    pub fn feed(&mut self, frame: Frame) -> Option<(Uuid, RequestOutcome)> {
        let FrameId::Uuid(id) = frame.id else {
            return None;
        };
        match frame.frame_type {
            FrameType::Chunk => {
                if let Some(payload) = frame.payload {
                    self.buffers.entry(id).or_default().extend_from_slice(&payload);
                }
                None
            }
            FrameType::End => {
                let mut buf = self.buffers.remove(&id).unwrap_or_default();
                if let Some(payload) = frame.payload {
                    buf.extend_from_slice(&payload);
                }
                Some((id, RequestOutcome::Ok(buf)))
            }
            FrameType::Err => {
                self.buffers.remove(&id);
                let message = frame
                    .meta
                    .as_ref()
                    .and_then(|meta| meta.get("message"))
                    .and_then(ciborium::Value::as_text)
                    .unwrap_or("unknown error")
                    .to_owned();
                Some((id, RequestOutcome::Err(message)))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_line() {
        let parsed = parse_request_line("cap:in=media:txt;out=media:txt;upper hello world").unwrap();
        assert_eq!(parsed.cap_urn, CapUrn::parse("cap:in=media:txt;out=media:txt;upper").unwrap());
        assert_eq!(parsed.text, "hello world");
    }

    #[test]
    fn rejects_line_with_no_space() {
        assert!(matches!(parse_request_line("no-space-here"), Err(RequestLineError::Malformed(_))));
    }

    #[test]
    fn rejects_bad_urn() {
        assert!(matches!(parse_request_line("not-a-urn hello"), Err(RequestLineError::BadUrn(_))));
    }

    #[test]
    fn assembler_concatenates_chunks_then_resolves_on_end() {
        let mut assembler = ResponseAssembler::new();
        let id = Uuid::new_v4();
        let chunk = |bytes: &[u8]| Frame::new(2, FrameType::Chunk, FrameId::Uuid(id), 0).with_payload("application/octet-stream", bytes.to_vec());
        assert!(assembler.feed(chunk(b"hel")).is_none());
        assert!(assembler.feed(chunk(b"lo")).is_none());
        let end = Frame::new(2, FrameType::End, FrameId::Uuid(id), 0);
        let (finished_id, outcome) = assembler.feed(end).unwrap();
        assert_eq!(finished_id, id);
        assert_eq!(outcome, RequestOutcome::Ok(b"hello".to_vec()));
    }

    #[test]
    fn assembler_reports_err_frame_message() {
        let mut assembler = ResponseAssembler::new();
        let id = Uuid::new_v4();
        let mut meta = std::collections::BTreeMap::new();
        meta.insert("message".to_owned(), ciborium::Value::Text("no route".to_owned()));
        let mut err = Frame::new(2, FrameType::Err, FrameId::Uuid(id), 0);
        err.meta = Some(meta);
        let (finished_id, outcome) = assembler.feed(err).unwrap();
        assert_eq!(finished_id, id);
        assert_eq!(outcome, RequestOutcome::Err("no route".to_owned()));
    }
}
