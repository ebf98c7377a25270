// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`Frame`] struct and its [`FrameType`]/[`FrameId`] companions — the
//! logical shape of a message on the wire, independent of its CBOR
//! encoding (see [`crate::codec`]).

use std::collections::BTreeMap;

use ciborium::Value;
use uuid::Uuid;

/// The kind of a [`Frame`], carried as a small integer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Handshake announcement, sent by both sides.
    Hello,
    /// A request to invoke a cap.
    Req,
    /// A slice of a chunked payload.
    Chunk,
    /// Marks the end of a request or response.
    End,
    /// A log line forwarded across the transport.
    Log,
    /// An error terminating a request.
    Err,
    /// A keepalive probe.
    Heartbeat,
    /// The start of one named output/argument stream.
    StreamStart,
    /// The end of one named output/argument stream.
    StreamEnd,
    /// Relay control-plane: a slave announcing state to its master.
    RelayNotify,
    /// Relay control-plane: a master broadcasting aggregated state.
    RelayState,
}

impl FrameType {
    /// The wire integer for this frame type. `2` (`RES`) is reserved and
    /// never produced by [`FrameType::from_code`]/[`FrameType::code`].
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Hello => 0,
            Self::Req => 1,
            Self::Chunk => 3,
            Self::End => 4,
            Self::Log => 5,
            Self::Err => 6,
            Self::Heartbeat => 7,
            Self::StreamStart => 8,
            Self::StreamEnd => 9,
            Self::RelayNotify => 10,
            Self::RelayState => 11,
        }
    }

    /// Decode a wire integer into a [`FrameType`].
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Hello),
            1 => Some(Self::Req),
            3 => Some(Self::Chunk),
            4 => Some(Self::End),
            5 => Some(Self::Log),
            6 => Some(Self::Err),
            7 => Some(Self::Heartbeat),
            8 => Some(Self::StreamStart),
            9 => Some(Self::StreamEnd),
            10 => Some(Self::RelayNotify),
            11 => Some(Self::RelayState),
            _ => None,
        }
    }
}

/// A frame's identifier: either a request UUID, or a small integer used by
/// heartbeats and other id-free control frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameId {
    /// A request id, allocated fresh per [`FrameType::Req`].
    Uuid(Uuid),
    /// A bare integer id.
    Number(u64),
}

impl FrameId {
    pub(crate) fn to_cbor_value(&self) -> Value {
        match self {
            Self::Uuid(uuid) => Value::Bytes(uuid.as_bytes().to_vec()),
            Self::Number(n) => Value::Integer((*n).into()),
        }
    }

    pub(crate) fn from_cbor_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bytes(bytes) if bytes.len() == 16 => {
                let array: [u8; 16] = bytes.as_slice().try_into().ok()?;
                Some(Self::Uuid(Uuid::from_bytes(array)))
            }
            Value::Integer(i) => u64::try_from(*i).ok().map(Self::Number),
            _ => None,
        }
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uuid(uuid) => write!(f, "{uuid}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// One frame on the wire: a CBOR map with integer keys, decoded into a
/// typed struct. Every field but `version`/`frame_type`/`id`/`seq` is
/// optional and omitted from the wire encoding when `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Protocol version of the sender.
    pub version: u8,
    /// The frame's kind.
    pub frame_type: FrameType,
    /// Request/response correlation id.
    pub id: FrameId,
    /// Monotonically non-decreasing sequence number within a stream.
    pub seq: u32,
    /// MIME content type of `payload`, if any.
    pub content_type: Option<String>,
    /// Free-form metadata map.
    pub meta: Option<BTreeMap<String, Value>>,
    /// Raw payload bytes.
    pub payload: Option<Vec<u8>>,
    /// Total logical length of the stream this chunk belongs to (first
    /// chunk only).
    pub len: Option<u64>,
    /// Absolute byte offset of `payload` within the logical stream.
    pub offset: Option<u64>,
    /// `true` on the final chunk of a stream.
    pub eof: Option<bool>,
    /// The cap URN this frame concerns (`REQ`), as canonical text.
    pub cap: Option<String>,
    /// The named stream this frame belongs to.
    pub stream_id: Option<String>,
    /// The media URN this frame's payload is encoded as.
    pub media_urn: Option<String>,
}

impl Frame {
    /// Build a minimal frame with only the required fields set.
    #[must_use]
    pub fn new(version: u8, frame_type: FrameType, id: FrameId, seq: u32) -> Self {
        Self {
            version,
            frame_type,
            id,
            seq,
            content_type: None,
            meta: None,
            payload: None,
            len: None,
            offset: None,
            eof: None,
            cap: None,
            stream_id: None,
            media_urn: None,
        }
    }

    /// Attach a payload and its content type.
    #[must_use]
    pub fn with_payload(mut self, content_type: impl Into<String>, payload: Vec<u8>) -> Self {
        self.content_type = Some(content_type.into());
        self.payload = Some(payload);
        self
    }

    /// Attach a stream id.
    #[must_use]
    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    /// Attach a cap URN.
    #[must_use]
    pub fn with_cap(mut self, cap: impl Into<String>) -> Self {
        self.cap = Some(cap.into());
        self
    }

    /// Attach a media URN.
    #[must_use]
    pub fn with_media_urn(mut self, media_urn: impl Into<String>) -> Self {
        self.media_urn = Some(media_urn.into());
        self
    }

    /// Mark this frame as chunk metadata: offset, optional total length,
    /// and eof flag.
    #[must_use]
    pub fn with_chunk_meta(mut self, offset: u64, len: Option<u64>, eof: bool) -> Self {
        self.offset = Some(offset);
        self.len = len;
        self.eof = Some(eof);
        self
    }
}
