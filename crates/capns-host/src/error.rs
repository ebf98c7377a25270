// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host-side error taxonomy, one variant per spec.md §7 error kind that
//! can originate on this side of the wire.

use capns_frame::FrameType;

/// Errors raised by [`crate::Host`] operations. A terminal variant ends
/// exactly one pending request (or the whole host, for handshake and
/// transport failures) and never reaches into unrelated in-flight
/// requests.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    /// The plugin's HELLO was malformed: missing manifest, missing a
    /// limit field, or an unexpected frame type in its place.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    /// `STREAM_START` for a `streamId` already open on this request.
    #[error("duplicate stream id: {0}")]
    DuplicateStreamId(String),
    /// A stream frame arrived after the request's `END`.
    #[error("stream activity after request end: {0}")]
    StreamAfterRequestEnd(String),
    /// `CHUNK` carried no `stream_id`.
    #[error("chunk frame missing stream id")]
    ChunkMissingStreamId,
    /// `CHUNK` named a `streamId` with no preceding `STREAM_START`.
    #[error("unknown stream id: {0}")]
    UnknownStreamId(String),
    /// `CHUNK` arrived after that stream's `STREAM_END`.
    #[error("chunk after stream end: {0}")]
    ChunkAfterStreamEnd(String),
    /// A frame type invalid in the current per-request state (e.g. a
    /// second `HELLO` after handshake).
    #[error("unexpected frame type: {0:?}")]
    UnexpectedFrameType(FrameType),
    /// The peer sent a terminal `ERR` frame.
    #[error("remote error {code}: {message}")]
    Remote {
        /// The `ERR` frame's stable `code` string.
        code: String,
        /// The `ERR` frame's human-readable message.
        message: String,
    },
    /// The response stream's consumer dropped it, or the host was closed
    /// while the request was outstanding.
    #[error("request closed")]
    Closed,
    /// The plugin process exited while the request was outstanding.
    #[error("process exited (code={code:?})")]
    ProcessExited {
        /// The process's exit code, if one was observed.
        code: Option<i32>,
    },
    /// Writing a frame to the transport failed; every pending request on
    /// this host fails with this error and the host is marked closed.
    #[error("failed to send frame: {0}")]
    SendFailed(String),
    /// Reading a frame from the transport failed; every pending request
    /// fails and the host is marked closed.
    #[error("failed to receive frame: {0}")]
    ReceiveFailed(String),
    /// A `REQ` arrived from the plugin but no [`crate::CapRouter`] was
    /// configured, or none of its entries accepted the request.
    #[error("no router configured for peer request {0}")]
    NoRouter(String),
    /// A caller-supplied input file could not be read.
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<capns_transport::TransportError> for HostError {
    fn from(err: capns_transport::TransportError) -> Self {
        Self::SendFailed(err.to_string())
    }
}
