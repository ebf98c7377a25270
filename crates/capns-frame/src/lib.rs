// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-frame
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The binary frame: a length-prefixed CBOR map that is the unit of
//! transport between a host and a plugin, or between relay peers. This
//! crate owns the [`Frame`] type, its CBOR codec, and the stream
//! reassembler used to turn `STREAM_START`/`CHUNK`/`STREAM_END` sequences
//! back into one payload. It does not read or write sockets/pipes itself
//! (see `capns-transport`).

mod assembler;
mod codec;
mod frame;

pub use assembler::StreamAssembler;
pub use codec::{decode, decode_framed, encode, encode_framed, HARD_FRAME_LIMIT};
pub use frame::{Frame, FrameId, FrameType};

/// Errors raised while encoding, decoding, or reassembling frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// An encoded frame exceeded the hard wire limit.
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// The offending size, in bytes.
        size: usize,
        /// The limit that was exceeded.
        limit: usize,
    },
    /// A frame's CBOR body was structurally invalid: not a map, a
    /// required key missing, or a key's value of the wrong type.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    /// CBOR serialization failed.
    #[error("cbor encode error: {0}")]
    Encode(String),
    /// A disk-backed stream buffer's I/O failed.
    #[error("i/o error: {0}")]
    Io(String),
}
