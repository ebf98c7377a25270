// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-transport
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Turns a raw byte stream (process stdio, a TCP socket) into a
//! [`FrameReader`]/[`FrameWriter`] pair that speaks the length-prefixed
//! CBOR framing from `capns-frame`, parametrized by a live, negotiable
//! [`Limits`]. This crate knows nothing about request/response semantics
//! or handshakes — see `capns-host`/`capns-plugin`/`capns-relay`.

mod limits;
mod reader;
mod writer;

pub use limits::{Limits, SharedLimits, DEFAULT_MAX_CHUNK, DEFAULT_MAX_FRAME, HARD_FRAME_LIMIT};
pub use reader::FrameReader;
pub use writer::FrameWriter;

/// Errors raised while reading or writing frames over a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The stream ended partway through a length prefix or frame body.
    /// A clean end-of-stream (no bytes read at a frame boundary) is
    /// `Ok(None)` from [`FrameReader::read_frame`], not this variant.
    #[error("unexpected eof mid-frame")]
    UnexpectedEof,
    /// An outgoing or incoming frame's size exceeds the negotiated
    /// `max_frame`.
    #[error("frame of {size} bytes exceeds the negotiated {limit} byte limit")]
    FrameTooLarge {
        /// The offending size, in bytes.
        size: u64,
        /// The negotiated limit that was exceeded.
        limit: u64,
    },
    /// The frame's CBOR body failed to encode or decode.
    #[error("frame codec error: {0}")]
    Frame(#[from] capns_frame::FrameError),
    /// The underlying byte stream failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_takes_elementwise_minimum() {
        let mine = Limits {
            max_frame: 1000,
            max_chunk: 100,
            max_reorder_buffer: Some(8),
        };
        let theirs = Limits {
            max_frame: 500,
            max_chunk: 200,
            max_reorder_buffer: None,
        };
        let negotiated = Limits::negotiate(mine, theirs);
        assert_eq!(negotiated.max_frame, 500);
        assert_eq!(negotiated.max_chunk, 100);
        assert_eq!(negotiated.max_reorder_buffer, None);
    }

    #[tokio::test]
    async fn reader_and_writer_round_trip_over_a_duplex_pipe() {
        use capns_frame::{Frame, FrameId, FrameType};

        let (mut client, mut server) = tokio::io::duplex(4096);
        let limits = SharedLimits::default();
        let writer = FrameWriter::new(&mut client, limits.clone());
        let frame = Frame::new(2, FrameType::Hello, FrameId::Number(0), 0)
            .with_payload("application/cbor", b"manifest".to_vec());
        writer.write_frame(&frame).await.unwrap();
        drop(writer);
        drop(client);

        let mut reader = FrameReader::new(&mut server, limits);
        let read = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(read, frame);
    }
}
