// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `pending: Map<Id, PendingRequest>` registry (spec.md §5's shared
//! resource #1), plus the per-request stream state machine it drives.

use std::collections::HashMap;
use std::sync::Mutex;

use capns_frame::{Frame, FrameType};
use ciborium::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::HostError;

/// One chunk of a response stream, or the information needed to surface
/// the terminal error for that request.
#[derive(Debug, Clone)]
pub struct ResponseChunk {
    /// The stream this chunk belongs to.
    pub stream_id: String,
    /// The media URN the stream was opened with (carried on
    /// `STREAM_START`; `None` on frames where it wasn't re-sent).
    pub media_urn: Option<String>,
    /// The chunk's raw bytes.
    pub payload: Vec<u8>,
    /// Whether this is the final chunk of `stream_id`.
    pub is_eof: bool,
}

/// Per-`streamId` bookkeeping for one pending request.
#[derive(Debug, Clone)]
struct StreamState {
    active: bool,
}

/// A request awaiting its response, keyed by UUID in [`PendingRequests`].
struct PendingRequest {
    streams: HashMap<String, StreamState>,
    ended: bool,
    sender: mpsc::Sender<Result<ResponseChunk, HostError>>,
}

/// The host's table of in-flight requests. Every method locks only for
/// the duration of the map operation itself (spec.md §5: "never held
/// across an await"); the extract-then-notify pattern removes a finished
/// request from the map before sending its terminal message.
#[derive(Default)]
pub struct PendingRequests {
    inner: Mutex<HashMap<Uuid, PendingRequest>>,
}

impl PendingRequests {
    /// Register a new pending request, returning nothing: the caller
    /// already holds the receiving end of `sender`.
    pub fn insert(&self, id: Uuid, sender: mpsc::Sender<Result<ResponseChunk, HostError>>) {
        let mut table = self.inner.lock().expect("pending requests lock poisoned");
        table.insert(
            id,
            PendingRequest {
                streams: HashMap::new(),
                ended: false,
                sender,
            },
        );
    }

    /// Number of requests currently outstanding.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("pending requests lock poisoned").len()
    }

    /// `true` if no requests are outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and fail every pending request with `err` (host-wide
    /// terminal failures: transport errors, close, process exit).
    pub async fn fail_all(&self, err: HostError) {
        let requests: Vec<PendingRequest> = {
            let mut table = self.inner.lock().expect("pending requests lock poisoned");
            table.drain().map(|(_, req)| req).collect()
        };
        for req in requests {
            let _ = req.sender.send(Err(err.clone())).await;
        }
    }

    /// Drop a request without notifying it further (consumer-initiated
    /// cancellation: spec.md §5, no `CANCEL` frame is sent).
    pub fn cancel(&self, id: &Uuid) {
        let mut table = self.inner.lock().expect("pending requests lock poisoned");
        table.remove(id);
    }

    async fn fail_one(&self, id: Uuid, err: HostError) {
        let req = {
            let mut table = self.inner.lock().expect("pending requests lock poisoned");
            table.remove(&id)
        };
        if let Some(req) = req {
            let _ = req.sender.send(Err(err)).await;
        }
    }

    /// Handle a `STREAM_START(streamId, mediaUrn)` frame for `id`.
    pub async fn stream_start(&self, id: Uuid, stream_id: String, media_urn: Option<String>) {
        let outcome = {
            let mut table = self.inner.lock().expect("pending requests lock poisoned");
            let Some(req) = table.get_mut(&id) else {
                return;
            };
            if req.ended {
                Some(Err(HostError::StreamAfterRequestEnd(stream_id.clone())))
            } else if req.streams.contains_key(&stream_id) {
                Some(Err(HostError::DuplicateStreamId(stream_id.clone())))
            } else {
                req.streams.insert(stream_id.clone(), StreamState { active: true });
                None
            }
        };
        if let Some(Err(err)) = outcome {
            self.fail_one(id, err).await;
            return;
        }
        let chunk = ResponseChunk {
            stream_id,
            media_urn,
            payload: Vec::new(),
            is_eof: false,
        };
        self.forward(id, chunk).await;
    }

    /// Handle a `CHUNK(streamId, payload, eof)` frame for `id`.
    pub async fn chunk(&self, id: Uuid, stream_id: Option<String>, payload: Vec<u8>, eof: bool) {
        let Some(stream_id) = stream_id else {
            self.fail_one(id, HostError::ChunkMissingStreamId).await;
            return;
        };
        let outcome = {
            let mut table = self.inner.lock().expect("pending requests lock poisoned");
            let Some(req) = table.get_mut(&id) else {
                return;
            };
            if req.ended {
                Err(HostError::StreamAfterRequestEnd(stream_id.clone()))
            } else {
                match req.streams.get(&stream_id) {
                    None => Err(HostError::UnknownStreamId(stream_id.clone())),
                    Some(state) if !state.active => {
                        Err(HostError::ChunkAfterStreamEnd(stream_id.clone()))
                    }
                    Some(_) => Ok(()),
                }
            }
        };
        if let Err(err) = outcome {
            self.fail_one(id, err).await;
            return;
        }
        let chunk = ResponseChunk {
            stream_id,
            media_urn: None,
            payload,
            is_eof: eof,
        };
        self.forward(id, chunk).await;
    }

    /// Handle a `STREAM_END(streamId)` frame for `id`.
    pub async fn stream_end(&self, id: Uuid, stream_id: String) {
        let mut table = self.inner.lock().expect("pending requests lock poisoned");
        if let Some(req) = table.get_mut(&id) {
            if let Some(state) = req.streams.get_mut(&stream_id) {
                state.active = false;
            }
        }
    }

    /// Handle the request's terminal `END` frame.
    pub async fn end(&self, id: Uuid) {
        let req = {
            let mut table = self.inner.lock().expect("pending requests lock poisoned");
            table.remove(&id)
        };
        drop(req);
    }

    /// Handle a terminal `ERR(code, message)` frame for `id`.
    pub async fn err(&self, id: Uuid, code: String, message: String) {
        self.fail_one(id, HostError::Remote { code, message }).await;
    }

    /// Handle an unexpected frame type arriving under a known request id.
    pub async fn unexpected(&self, id: Uuid, frame_type: capns_frame::FrameType) {
        self.fail_one(id, HostError::UnexpectedFrameType(frame_type)).await;
    }

    async fn forward(&self, id: Uuid, chunk: ResponseChunk) {
        let sender = {
            let table = self.inner.lock().expect("pending requests lock poisoned");
            table.get(&id).map(|req| req.sender.clone())
        };
        if let Some(sender) = sender {
            let _ = sender.send(Ok(chunk)).await;
        }
    }

    /// Dispatch one response frame for `id` to whichever handler above
    /// applies, inferred from `frame.frame_type`. Shared by the host's own
    /// reader loop and by anything else (a plugin demultiplexing replies
    /// to its own peer-invoked requests) that drives this same state
    /// machine over a different transport.
    pub async fn route(&self, id: Uuid, frame: Frame) {
        match frame.frame_type {
            FrameType::StreamStart => {
                let stream_id = frame.stream_id.unwrap_or_default();
                self.stream_start(id, stream_id, frame.media_urn).await;
            }
            FrameType::Chunk => {
                let eof = frame.eof.unwrap_or(false);
                self.chunk(id, frame.stream_id, frame.payload.unwrap_or_default(), eof).await;
            }
            FrameType::StreamEnd => {
                let stream_id = frame.stream_id.unwrap_or_default();
                self.stream_end(id, stream_id).await;
            }
            FrameType::End => {
                self.end(id).await;
            }
            FrameType::Err => {
                let meta = frame.meta.unwrap_or_default();
                let code = meta.get("code").and_then(Value::as_text).unwrap_or("unknown").to_owned();
                let message = meta.get("message").and_then(Value::as_text).unwrap_or("").to_owned();
                self.err(id, code, message).await;
            }
            other => {
                self.unexpected(id, other).await;
            }
        }
    }
}
