// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`Host`]: the state machine that owns one plugin transport — handshake,
//! request issue, and the dedicated reader loop that demultiplexes
//! responses and services peer-invoked requests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use capns_frame::{Frame, FrameId, FrameType};
use capns_transport::{FrameReader, FrameWriter, Limits, SharedLimits};
use ciborium::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::handshake::host_handshake;
use crate::peer::PeerRequests;
use crate::pending::{PendingRequests, ResponseChunk};
use crate::router::CapRouter;
use crate::HostError;

/// A handshake-complete connection to one plugin process. `W` is the
/// transport's write half; the reader loop runs detached on a spawned
/// task and owns the read half for the connection's lifetime.
pub struct Host<W> {
    writer: FrameWriter<W>,
    limits: SharedLimits,
    manifest: Vec<u8>,
    pending: Arc<PendingRequests>,
    peer_requests: Arc<PeerRequests>,
    closed: Arc<AtomicBool>,
    next_heartbeat_id: AtomicU64,
    reader_task: tokio::task::JoinHandle<()>,
}

impl<W> Host<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Perform the handshake over `reader`/`writer`, then spawn the
    /// reader loop. `router` services `REQ` frames arriving from the
    /// plugin (peer invoke); pass `None` if this host never accepts
    /// peer-invoked requests.
    ///
    /// # Errors
    ///
    /// See [`host_handshake`].
    pub async fn connect<R>(
        mut reader: FrameReader<R>,
        writer: FrameWriter<W>,
        proposed: Limits,
        router: Option<Arc<dyn CapRouter>>,
    ) -> Result<Self, HostError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (negotiated, manifest) = host_handshake(&mut reader, &writer, proposed).await?;
        let shared_limits = SharedLimits::new(negotiated);

        let pending = Arc::new(PendingRequests::default());
        let peer_requests = Arc::new(PeerRequests::default());
        let closed = Arc::new(AtomicBool::new(false));

        let reader_task = tokio::spawn(reader_loop(
            reader,
            writer.clone(),
            Arc::clone(&pending),
            Arc::clone(&peer_requests),
            Arc::clone(&closed),
            router,
        ));

        Ok(Self {
            writer,
            limits: shared_limits,
            manifest,
            pending,
            peer_requests,
            closed,
            next_heartbeat_id: AtomicU64::new(1),
            reader_task,
        })
    }

    /// The plugin's manifest, as raw bytes exactly as received in HELLO.
    #[must_use]
    pub fn manifest(&self) -> &[u8] {
        &self.manifest
    }

    /// The negotiated limits currently in force.
    #[must_use]
    pub fn limits(&self) -> Limits {
        self.limits.get()
    }

    /// `true` once the transport has failed or [`Host::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Issue a request carrying a single payload (spec.md §4.I "Request
    /// issue"). Splits into REQ+CHUNK...+END automatically when `payload`
    /// exceeds the negotiated `max_chunk`.
    ///
    /// # Errors
    ///
    /// [`HostError::SendFailed`] if writing any frame fails; the returned
    /// stream then yields no items.
    pub async fn request(
        &self,
        cap_urn: &str,
        payload: Vec<u8>,
        content_type: &str,
    ) -> Result<ReceiverStream<Result<ResponseChunk, HostError>>, HostError> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(64);
        self.pending.insert(id, tx);

        let max_chunk = self.limits.get().max_chunk as usize;
        if payload.is_empty() {
            let req = Frame::new(2, FrameType::Req, FrameId::Uuid(id), 0).with_cap(cap_urn);
            self.writer.write_frame(&req).await?;
            let end = Frame::new(2, FrameType::End, FrameId::Uuid(id), 1);
            self.writer.write_frame(&end).await?;
        } else if payload.len() <= max_chunk {
            let req = Frame::new(2, FrameType::Req, FrameId::Uuid(id), 0)
                .with_cap(cap_urn)
                .with_payload(content_type, payload);
            self.writer.write_frame(&req).await?;
        } else {
            let req = Frame::new(2, FrameType::Req, FrameId::Uuid(id), 0).with_cap(cap_urn);
            self.writer.write_frame(&req).await?;
            let total = payload.len() as u64;
            let mut seq = 1u32;
            for (offset, window) in (0usize..).step_by(max_chunk).zip(payload.chunks(max_chunk)) {
                let is_last = offset + window.len() == payload.len();
                let frame_type = if is_last { FrameType::End } else { FrameType::Chunk };
                let frame = Frame::new(2, frame_type, FrameId::Uuid(id), seq)
                    .with_payload(content_type, window.to_vec())
                    .with_chunk_meta(offset as u64, if offset == 0 { Some(total) } else { None }, is_last);
                self.writer.write_frame(&frame).await?;
                seq += 1;
            }
        }

        Ok(ReceiverStream::new(rx))
    }

    /// Issue a request carrying multiple named arguments (spec.md §4.I,
    /// protocol v2 only): `REQ(cap, empty)`, then for each argument a
    /// `STREAM_START(streamId, mediaUrn)` / `CHUNK`×n / `STREAM_END(streamId)`
    /// sequence, then a final `END` closing the argument phase.
    ///
    /// # Errors
    ///
    /// [`HostError::SendFailed`] if writing any frame fails; the returned
    /// stream then yields no items.
    pub async fn request_with_arguments(
        &self,
        cap_urn: &str,
        args: Vec<(String, Vec<u8>)>,
    ) -> Result<ReceiverStream<Result<ResponseChunk, HostError>>, HostError> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(64);
        self.pending.insert(id, tx);

        let max_chunk = self.limits.get().max_chunk as usize;
        let req = Frame::new(2, FrameType::Req, FrameId::Uuid(id), 0).with_cap(cap_urn);
        self.writer.write_frame(&req).await?;

        let mut seq = 1u32;
        for (media_urn, payload) in args {
            let stream_id = Uuid::new_v4().to_string();
            let start = Frame::new(2, FrameType::StreamStart, FrameId::Uuid(id), seq)
                .with_stream_id(stream_id.clone())
                .with_media_urn(media_urn);
            self.writer.write_frame(&start).await?;
            seq += 1;

            let total = payload.len() as u64;
            let mut offset = 0u64;
            for window in payload.chunks(max_chunk.max(1)) {
                let is_last = offset + window.len() as u64 == total;
                let chunk = Frame::new(2, FrameType::Chunk, FrameId::Uuid(id), seq)
                    .with_stream_id(stream_id.clone())
                    .with_payload("application/octet-stream", window.to_vec())
                    .with_chunk_meta(offset, if offset == 0 { Some(total) } else { None }, is_last);
                self.writer.write_frame(&chunk).await?;
                seq += 1;
                offset += window.len() as u64;
            }

            let end = Frame::new(2, FrameType::StreamEnd, FrameId::Uuid(id), seq).with_stream_id(stream_id);
            self.writer.write_frame(&end).await?;
            seq += 1;
        }

        let end = Frame::new(2, FrameType::End, FrameId::Uuid(id), seq);
        self.writer.write_frame(&end).await?;

        Ok(ReceiverStream::new(rx))
    }

    /// Send a `HEARTBEAT` and return its id; the reader loop consumes the
    /// matching reply silently.
    ///
    /// # Errors
    ///
    /// [`HostError::SendFailed`] if the write fails.
    pub async fn send_heartbeat(&self) -> Result<u64, HostError> {
        let id = self.next_heartbeat_id.fetch_add(1, Ordering::Relaxed);
        let frame = Frame::new(2, FrameType::Heartbeat, FrameId::Number(id), 0);
        self.writer.write_frame(&frame).await?;
        Ok(id)
    }

    /// Drop a request's response stream without waiting for its natural
    /// completion (spec.md §5 cancellation: no `CANCEL` frame is sent).
    pub fn cancel(&self, request_id: Uuid) {
        self.pending.cancel(&request_id);
    }

    /// Close the connection: mark it closed, fail every pending request
    /// with [`HostError::Closed`], and abort the reader task. Writing
    /// further frames after this is a logic error in the caller.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.pending.fail_all(HostError::Closed).await;
        self.reader_task.abort();
    }
}

async fn reader_loop<R, W>(
    mut reader: FrameReader<R>,
    writer: FrameWriter<W>,
    pending: Arc<PendingRequests>,
    peer_requests: Arc<PeerRequests>,
    closed: Arc<AtomicBool>,
    router: Option<Arc<dyn CapRouter>>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let frame = match reader.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(target: "capns.host", "plugin closed the transport");
                closed.store(true, Ordering::Release);
                pending.fail_all(HostError::ProcessExited { code: None }).await;
                return;
            }
            Err(err) => {
                warn!(target: "capns.host", error = %err, "transport read failed");
                closed.store(true, Ordering::Release);
                pending.fail_all(HostError::ReceiveFailed(err.to_string())).await;
                return;
            }
        };

        match frame.frame_type {
            FrameType::Heartbeat => {
                let reply = Frame::new(2, FrameType::Heartbeat, frame.id.clone(), 0);
                if writer.write_frame(&reply).await.is_err() {
                    return;
                }
            }
            FrameType::Req => {
                let FrameId::Uuid(id) = frame.id.clone() else {
                    warn!(target: "capns.host", "peer REQ missing uuid id; dropping");
                    continue;
                };
                match router.clone() {
                    Some(router) => {
                        tokio::spawn(service_peer_request(
                            id,
                            frame,
                            writer.clone(),
                            router,
                            Arc::clone(&peer_requests),
                        ));
                    }
                    None => {
                        warn!(target: "capns.host", "REQ from plugin with no router configured; dropping");
                    }
                }
            }
            other => {
                let FrameId::Uuid(id) = frame.id.clone() else {
                    continue;
                };
                if !peer_requests.forward(id, frame.clone()).await {
                    pending.route(id, frame).await;
                }
                if matches!(other, FrameType::End | FrameType::Err) {
                    peer_requests.remove(&id);
                }
            }
        }
    }
}

/// Service one plugin-initiated `REQ`: resolve a handler via `router`,
/// register it in `peer_requests` so later continuation frames reach it,
/// forward the `REQ` itself (it may already carry a v1-style inline
/// payload), then pump the handler's response frames back to the plugin
/// under the same request id until `END`/`ERR`.
async fn service_peer_request<W>(
    id: Uuid,
    req: Frame,
    writer: FrameWriter<W>,
    router: Arc<dyn CapRouter>,
    peer_requests: Arc<PeerRequests>,
) where
    W: AsyncWrite + Unpin,
{
    let Some(cap_text) = req.cap.as_deref() else {
        warn!(target: "capns.host", "REQ from plugin missing cap urn");
        write_peer_error(&writer, id, "NO_CAP", "REQ missing cap urn").await;
        return;
    };
    let Ok(cap_urn) = capns_urn::CapUrn::parse(cap_text) else {
        warn!(target: "capns.host", cap = cap_text, "REQ from plugin carried an unparsable cap urn");
        write_peer_error(&writer, id, "BAD_CAP_URN", "REQ cap urn did not parse").await;
        return;
    };

    let mut handle = match router.route(&cap_urn, id).await {
        Ok(handle) => handle,
        Err(err) => {
            warn!(target: "capns.host", error = %err, "peer request routing failed");
            write_peer_error(&writer, id, "NO_ROUTE", &err.to_string()).await;
            return;
        }
    };

    peer_requests.insert(id, handle.sender());
    if req.payload.is_some() {
        let _ = handle.forward_frame(req).await;
    }

    let mut terminated = false;
    while let Some(frame) = handle.responses.recv().await {
        terminated = matches!(frame.frame_type, FrameType::End | FrameType::Err);
        if writer.write_frame(&frame).await.is_err() {
            break;
        }
        if terminated {
            break;
        }
    }
    if !terminated {
        let end = Frame::new(2, FrameType::End, FrameId::Uuid(id), 0);
        let _ = writer.write_frame(&end).await;
    }
    peer_requests.remove(&id);
}

async fn write_peer_error<W>(writer: &FrameWriter<W>, id: Uuid, code: &str, message: &str)
where
    W: AsyncWrite + Unpin,
{
    let mut meta = std::collections::BTreeMap::new();
    meta.insert("code".to_owned(), Value::Text(code.to_owned()));
    meta.insert("message".to_owned(), Value::Text(message.to_owned()));
    let mut frame = Frame::new(2, FrameType::Err, FrameId::Uuid(id), 0);
    frame.meta = Some(meta);
    let _ = writer.write_frame(&frame).await;
}
