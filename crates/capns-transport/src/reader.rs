// SPDX-License-Identifier: MIT OR Apache-2.0
//! Length-prefixed [`Frame`] reading over any [`AsyncRead`].

use capns_frame::{decode, Frame};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{SharedLimits, TransportError};

/// Reads one frame at a time from an [`AsyncRead`] stream, honoring the
/// live [`SharedLimits`]. Not `Clone`/`Sync`: a connection has exactly one
/// reader loop.
pub struct FrameReader<R> {
    inner: R,
    limits: SharedLimits,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap `inner`, reading against `limits` (expected to be updated in
    /// place once the handshake completes).
    pub fn new(inner: R, limits: SharedLimits) -> Self {
        Self { inner, limits }
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` on a clean end-of-stream (no bytes read while
    /// expecting a fresh length prefix). A stream that ends partway
    /// through a length prefix or a frame body is
    /// [`TransportError::UnexpectedEof`], not a clean close.
    ///
    /// # Errors
    ///
    /// [`TransportError::FrameTooLarge`] if the declared length exceeds
    /// the negotiated `max_frame`; [`TransportError::Frame`] if the body
    /// fails to decode; [`TransportError::Io`] on any other I/O failure.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        let mut len_buf = [0u8; 4];
        let mut filled = 0usize;
        while filled < len_buf.len() {
            let n = self
                .inner
                .read(&mut len_buf[filled..])
                .await
                .map_err(TransportError::Io)?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(TransportError::UnexpectedEof);
            }
            filled += n;
        }

        let declared_len = u32::from_be_bytes(len_buf) as u64;
        let max_frame = self.limits.get().max_frame;
        if declared_len > max_frame {
            return Err(TransportError::FrameTooLarge {
                size: declared_len,
                limit: max_frame,
            });
        }

        let mut body = vec![0u8; declared_len as usize];
        self.inner.read_exact(&mut body).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                TransportError::UnexpectedEof
            } else {
                TransportError::Io(err)
            }
        })?;

        let frame = decode(&body)?;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capns_frame::{encode_framed, FrameId, FrameType};
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_a_frame_written_with_the_length_prefix() {
        let frame = Frame::new(2, FrameType::Heartbeat, FrameId::Number(1), 0);
        let wire = encode_framed(&frame).unwrap();
        let mut reader = FrameReader::new(Cursor::new(wire), SharedLimits::default());
        let read = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(read, frame);
    }

    #[tokio::test]
    async fn clean_eof_before_any_bytes_is_none() {
        let mut reader = FrameReader::new(Cursor::new(Vec::new()), SharedLimits::default());
        assert_eq!(reader.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn eof_mid_length_prefix_is_unexpected_eof() {
        let mut reader = FrameReader::new(Cursor::new(vec![0u8, 1]), SharedLimits::default());
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedEof));
    }

    #[tokio::test]
    async fn eof_mid_body_is_unexpected_eof() {
        let frame = Frame::new(2, FrameType::Heartbeat, FrameId::Number(1), 0);
        let wire = encode_framed(&frame).unwrap();
        let truncated = &wire[..wire.len() - 1];
        let mut reader = FrameReader::new(Cursor::new(truncated.to_vec()), SharedLimits::default());
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedEof));
    }

    #[tokio::test]
    async fn declared_length_over_max_frame_is_rejected() {
        use crate::Limits;
        let frame = Frame::new(2, FrameType::Heartbeat, FrameId::Number(1), 0)
            .with_payload("application/octet-stream", vec![0u8; 100]);
        let wire = encode_framed(&frame).unwrap();
        let limits = SharedLimits::new(Limits {
            max_frame: 10,
            ..Limits::default()
        });
        let mut reader = FrameReader::new(Cursor::new(wire), limits);
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }
}
