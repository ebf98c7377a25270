// SPDX-License-Identifier: MIT OR Apache-2.0
//! `FrameSender`: the seam between a handler's output and the two very
//! different things that output can mean.
//!
//! In CBOR mode every [`crate::OutputStream`] write becomes a real
//! `STREAM_START`/`CHUNK`/`STREAM_END` sequence on the wire. In CLI mode
//! there is no wire at all — a single cap is being run as a subcommand,
//! and "output" just means "bytes on stdout". Rather than have
//! [`crate::io_stream::OutputStream`] branch on a mode flag, both cases
//! implement this trait and the output stream stays mode-agnostic.
//!
//! [`TransportFrameSender`] is used generically (dynamic dispatch, one
//! instance shared across every concurrently-running handler on a
//! connection); [`CliFrameSender`] is used monomorphically in CLI mode,
//! where the concrete type is known at the call site and there is only
//! ever one handler running.

use async_trait::async_trait;
use capns_frame::{Frame, FrameType};
use capns_transport::FrameWriter;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::PluginError;

/// Something a [`crate::OutputStream`] can hand finished frames to.
#[async_trait]
pub trait FrameSender: Send + Sync {
    /// Send one frame. Implementations that aren't wire-framed at all
    /// (CLI mode) are free to project just the payload out of it.
    async fn send(&self, frame: Frame) -> Result<(), PluginError>;
}

/// Writes frames onto the real wire transport, unchanged.
pub struct TransportFrameSender<W> {
    writer: FrameWriter<W>,
}

impl<W> TransportFrameSender<W> {
    /// Wrap an existing [`FrameWriter`].
    #[must_use]
    pub fn new(writer: FrameWriter<W>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> FrameSender for TransportFrameSender<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, frame: Frame) -> Result<(), PluginError> {
        self.writer.write_frame(&frame).await.map_err(PluginError::from)
    }
}

/// Writes a `CHUNK`/`END` frame's raw payload straight to an
/// [`AsyncWrite`] (stdout, in practice), with no framing at all:
/// `STREAM_START`/`STREAM_END`/`HELLO`/control frames are silently
/// dropped since a CLI invocation has exactly one output and no peer to
/// negotiate with.
pub struct CliFrameSender<W> {
    out: Mutex<W>,
}

impl<W> CliFrameSender<W> {
    /// Wrap the stream bytes are written to.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }
}

#[async_trait]
impl<W> FrameSender for CliFrameSender<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, frame: Frame) -> Result<(), PluginError> {
        if !matches!(frame.frame_type, FrameType::Chunk | FrameType::End) {
            return Ok(());
        }
        let Some(payload) = frame.payload else {
            return Ok(());
        };
        let mut out = self.out.lock().await;
        out.write_all(&payload).await?;
        out.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capns_frame::FrameId;

    #[tokio::test]
    async fn cli_sender_writes_only_payload_bytes() {
        let mut buf = Vec::new();
        {
            let sender = CliFrameSender::new(&mut buf);
            let start = Frame::new(2, FrameType::StreamStart, FrameId::Number(0), 0);
            sender.send(start).await.unwrap();
            let chunk = Frame::new(2, FrameType::Chunk, FrameId::Number(0), 1)
                .with_payload("application/octet-stream", b"hello ".to_vec());
            sender.send(chunk).await.unwrap();
            let end = Frame::new(2, FrameType::End, FrameId::Number(0), 2)
                .with_payload("application/octet-stream", b"world".to_vec());
            sender.send(end).await.unwrap();
        }
        assert_eq!(buf, b"hello world");
    }
}
