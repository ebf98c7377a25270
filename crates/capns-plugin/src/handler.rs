// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`CapHandler`]: the trait a plugin author implements per cap, plus the
//! two mandatory built-ins every manifest carries (spec.md §2: "every
//! manifest must declare an identity cap").

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::frame_sender::FrameSender;
use crate::io_stream::{InputPackage, OutputStream};
use crate::peer_invoke::PeerInvoker;
use crate::PluginError;

/// Everything a running handler needs besides its arguments: where to
/// write output, and (in CBOR mode only) a way to call back into the
/// host.
pub struct Invocation<F> {
    id: Uuid,
    sender: Arc<F>,
    max_chunk: usize,
    peer: Option<Arc<PeerInvoker<F>>>,
}

impl<F> Invocation<F>
where
    F: FrameSender,
{
    pub(crate) fn new(id: Uuid, sender: Arc<F>, max_chunk: usize, peer: Option<Arc<PeerInvoker<F>>>) -> Self {
        Self {
            id,
            sender,
            max_chunk,
            peer,
        }
    }

    /// Open this request's single (unnamed) output stream.
    #[must_use]
    pub fn output(&self, media_urn: impl Into<String>) -> OutputStream<F> {
        OutputStream::new(Arc::clone(&self.sender), self.id, "", media_urn, self.max_chunk)
    }

    /// Open one of several named output streams.
    #[must_use]
    pub fn named_output(&self, stream_id: impl Into<String>, media_urn: impl Into<String>) -> OutputStream<F> {
        OutputStream::new(Arc::clone(&self.sender), self.id, stream_id, media_urn, self.max_chunk)
    }

    /// A way to invoke other caps through the host, if this invocation is
    /// running over a live host connection. `None` in CLI mode, where
    /// there is no host to call back into.
    #[must_use]
    pub fn peer(&self) -> Option<&PeerInvoker<F>> {
        self.peer.as_deref()
    }
}

/// Implemented once per cap a plugin exposes.
#[async_trait]
pub trait CapHandler<F>: Send + Sync
where
    F: FrameSender,
{
    /// Service one invocation: consume `args` (in whatever order its
    /// streams arrive) and write to whatever outputs `ctx` declares
    /// before returning. Returning `Err` causes the runtime to emit a
    /// terminal `ERR` frame for the request instead of `END`.
    async fn handle(&self, args: InputPackage, ctx: Invocation<F>) -> Result<(), PluginError>;
}

/// The mandatory identity cap: copies its single input stream to its
/// single output stream unchanged.
pub struct IdentityHandler;

#[async_trait]
impl<F> CapHandler<F> for IdentityHandler
where
    F: FrameSender,
{
    async fn handle(&self, mut args: InputPackage, ctx: Invocation<F>) -> Result<(), PluginError> {
        let output = ctx.output("media:");
        while let Some(mut stream) = args.next_stream().await {
            while let Some(chunk) = stream.next_chunk().await {
                output.write(&chunk).await?;
            }
        }
        output.close().await
    }
}

/// The optional discard cap: reads and drops all input, producing
/// `media:void`.
pub struct DiscardHandler;

#[async_trait]
impl<F> CapHandler<F> for DiscardHandler
where
    F: FrameSender,
{
    async fn handle(&self, mut args: InputPackage, ctx: Invocation<F>) -> Result<(), PluginError> {
        while let Some(mut stream) = args.next_stream().await {
            while stream.next_chunk().await.is_some() {}
        }
        ctx.output("media:void").close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_sender::CliFrameSender;
    use crate::io_stream::demux_request;
    use capns_frame::{Frame, FrameId, FrameType};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn identity_handler_copies_input_to_output() {
        let req = Frame::new(2, FrameType::Req, FrameId::Uuid(Uuid::new_v4()), 0)
            .with_cap("cap:in=media:;out=media:")
            .with_payload("application/octet-stream", b"payload".to_vec());
        let (_tx, rx) = mpsc::channel(1);
        let package = demux_request(req, rx);

        let mut buf = Vec::new();
        let sender = Arc::new(CliFrameSender::new(&mut buf));
        let ctx = Invocation::new(Uuid::new_v4(), sender, 1024, None);
        IdentityHandler.handle(package, ctx).await.unwrap();

        assert_eq!(buf, b"payload");
    }

    #[tokio::test]
    async fn discard_handler_drains_input_and_emits_no_bytes() {
        let req = Frame::new(2, FrameType::Req, FrameId::Uuid(Uuid::new_v4()), 0)
            .with_cap("cap:in=media:;out=media:void")
            .with_payload("application/octet-stream", b"ignored".to_vec());
        let (_tx, rx) = mpsc::channel(1);
        let package = demux_request(req, rx);

        let mut buf = Vec::new();
        let sender = Arc::new(CliFrameSender::new(&mut buf));
        let ctx = Invocation::new(Uuid::new_v4(), sender, 1024, None);
        DiscardHandler.handle(package, ctx).await.unwrap();

        assert!(buf.is_empty());
    }
}
