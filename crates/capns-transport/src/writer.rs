// SPDX-License-Identifier: MIT OR Apache-2.0
//! Length-prefixed [`Frame`] writing over any [`AsyncWrite`], serialized
//! behind a single lock so concurrent writers never interleave mid-frame.

use std::sync::Arc;

use capns_frame::{encode_framed, Frame};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::{SharedLimits, TransportError};

/// Writes frames to an [`AsyncWrite`] stream. Cheaply `Clone`-able: every
/// clone shares the same underlying writer and lock, so a reader-loop
/// task, a heartbeat task, and request-issuing callers can all hold one
/// without fighting over `&mut`.
#[derive(Clone)]
pub struct FrameWriter<W> {
    inner: Arc<Mutex<W>>,
    limits: SharedLimits,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap `inner`, checking outgoing frames against `limits`.
    pub fn new(inner: W, limits: SharedLimits) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
            limits,
        }
    }

    /// Encode and write one frame atomically: the length prefix and body
    /// are written under the same lock acquisition, so no other frame can
    /// land in between.
    ///
    /// # Errors
    ///
    /// [`TransportError::FrameTooLarge`] if the encoded frame exceeds the
    /// negotiated `max_frame`; [`TransportError::Frame`] if encoding
    /// fails; [`TransportError::Io`] on a write failure.
    pub async fn write_frame(&self, frame: &Frame) -> Result<(), TransportError> {
        let wire = encode_framed(frame)?;
        let max_frame = self.limits.get().max_frame;
        let body_len = (wire.len() - 4) as u64;
        if body_len > max_frame {
            return Err(TransportError::FrameTooLarge {
                size: body_len,
                limit: max_frame,
            });
        }

        let mut guard = self.inner.lock().await;
        guard.write_all(&wire).await.map_err(TransportError::Io)?;
        guard.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SharedLimits;
    use capns_frame::{FrameId, FrameType};

    #[tokio::test]
    async fn writes_a_length_prefixed_frame() {
        let mut buf = Vec::new();
        {
            let writer = FrameWriter::new(&mut buf, SharedLimits::default());
            let frame = Frame::new(2, FrameType::Heartbeat, FrameId::Number(7), 0);
            writer.write_frame(&frame).await.unwrap();
        }
        let declared = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(buf.len(), 4 + declared);
    }

    #[tokio::test]
    async fn rejects_frame_over_negotiated_max() {
        use crate::Limits;
        let mut buf = Vec::new();
        let limits = SharedLimits::new(Limits {
            max_frame: 4,
            ..Limits::default()
        });
        let writer = FrameWriter::new(&mut buf, limits);
        let frame = Frame::new(2, FrameType::Chunk, FrameId::Number(1), 0)
            .with_payload("application/octet-stream", vec![0u8; 64]);
        let err = writer.write_frame(&frame).await.unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }
}
