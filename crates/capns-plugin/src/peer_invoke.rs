// SPDX-License-Identifier: MIT OR Apache-2.0
//! Calling back into the host from inside a handler (spec.md §4.I "Peer
//! invoke"): a plugin cap that itself needs another cap's output issues a
//! `REQ` over the very same connection it was invoked on, and demuxes the
//! reply with the identical state machine the host uses for its own
//! requests — hence the direct reuse of [`capns_host::PendingRequests`].

use std::sync::Arc;

use capns_frame::{Frame, FrameId, FrameType};
use capns_host::{HostError, PendingRequests, ResponseChunk};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::frame_sender::FrameSender;
use crate::PluginError;

impl From<HostError> for PluginError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Remote { code, message } => Self::Remote { code, message },
            HostError::Closed | HostError::ProcessExited { .. } => Self::Closed,
            HostError::SendFailed(msg) => Self::SendFailed(msg),
            HostError::ReceiveFailed(msg) => Self::ReceiveFailed(msg),
            other => Self::HandlerFailed(other.to_string()),
        }
    }
}

/// Issues `REQ`s back to the host on behalf of a running handler, and
/// demultiplexes their responses.
pub struct PeerInvoker<F> {
    sender: Arc<F>,
    pending: Arc<PendingRequests>,
    max_chunk: usize,
}

/// The response stream to one peer-invoked call.
pub struct PeerResponse {
    rx: mpsc::Receiver<Result<ResponseChunk, HostError>>,
}

impl PeerResponse {
    /// The next response chunk, or `None` once the call has completed.
    pub async fn next(&mut self) -> Option<Result<ResponseChunk, PluginError>> {
        self.rx.recv().await.map(|result| result.map_err(PluginError::from))
    }

    /// Buffer every chunk of the call's (assumed single-stream) response.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>, PluginError> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?.payload);
        }
        Ok(buf)
    }
}

impl<F> PeerInvoker<F>
where
    F: FrameSender,
{
    pub(crate) fn new(sender: Arc<F>, pending: Arc<PendingRequests>, max_chunk: usize) -> Self {
        Self {
            sender,
            pending,
            max_chunk: max_chunk.max(1),
        }
    }

    /// Call `cap_urn` with a single payload, splitting into `CHUNK`s if it
    /// exceeds the negotiated `max_chunk` (mirrors [`capns_host::Host::request`]).
    pub async fn call(&self, cap_urn: &str, payload: Vec<u8>, content_type: &str) -> Result<PeerResponse, PluginError> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(64);
        self.pending.insert(id, tx);

        if payload.is_empty() {
            let req = Frame::new(2, FrameType::Req, FrameId::Uuid(id), 0).with_cap(cap_urn);
            self.sender.send(req).await?;
            let end = Frame::new(2, FrameType::End, FrameId::Uuid(id), 1);
            self.sender.send(end).await?;
        } else if payload.len() <= self.max_chunk {
            let req = Frame::new(2, FrameType::Req, FrameId::Uuid(id), 0)
                .with_cap(cap_urn)
                .with_payload(content_type, payload);
            self.sender.send(req).await?;
        } else {
            let req = Frame::new(2, FrameType::Req, FrameId::Uuid(id), 0).with_cap(cap_urn);
            self.sender.send(req).await?;
            let total = payload.len() as u64;
            let mut seq = 1u32;
            let mut offset = 0u64;
            for window in payload.chunks(self.max_chunk) {
                let is_last = offset + window.len() as u64 == total;
                let frame_type = if is_last { FrameType::End } else { FrameType::Chunk };
                let frame = Frame::new(2, frame_type, FrameId::Uuid(id), seq)
                    .with_payload(content_type, window.to_vec())
                    .with_chunk_meta(offset, if offset == 0 { Some(total) } else { None }, is_last);
                self.sender.send(frame).await?;
                seq += 1;
                offset += window.len() as u64;
            }
        }

        Ok(PeerResponse { rx })
    }

    /// Call `cap_urn` with several named arguments (mirrors
    /// [`capns_host::Host::request_with_arguments`]).
    pub async fn call_with_arguments(&self, cap_urn: &str, args: Vec<(String, Vec<u8>)>) -> Result<PeerResponse, PluginError> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(64);
        self.pending.insert(id, tx);

        let req = Frame::new(2, FrameType::Req, FrameId::Uuid(id), 0).with_cap(cap_urn);
        self.sender.send(req).await?;

        let mut seq = 1u32;
        for (media_urn, payload) in args {
            let stream_id = Uuid::new_v4().to_string();
            let start = Frame::new(2, FrameType::StreamStart, FrameId::Uuid(id), seq)
                .with_stream_id(stream_id.clone())
                .with_media_urn(media_urn);
            self.sender.send(start).await?;
            seq += 1;

            let total = payload.len() as u64;
            let mut offset = 0u64;
            for window in payload.chunks(self.max_chunk) {
                let is_last = offset + window.len() as u64 == total;
                let chunk = Frame::new(2, FrameType::Chunk, FrameId::Uuid(id), seq)
                    .with_stream_id(stream_id.clone())
                    .with_payload("application/octet-stream", window.to_vec())
                    .with_chunk_meta(offset, if offset == 0 { Some(total) } else { None }, is_last);
                self.sender.send(chunk).await?;
                seq += 1;
                offset += window.len() as u64;
            }

            let end = Frame::new(2, FrameType::StreamEnd, FrameId::Uuid(id), seq).with_stream_id(stream_id);
            self.sender.send(end).await?;
            seq += 1;
        }

        let end = Frame::new(2, FrameType::End, FrameId::Uuid(id), seq);
        self.sender.send(end).await?;

        Ok(PeerResponse { rx })
    }
}
