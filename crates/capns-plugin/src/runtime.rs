// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`PluginRuntime`]: owns a manifest and its handlers, and — in CBOR mode
//! — the handshake and reader loop that dispatch incoming `REQ`s to them.
//!
//! The reader loop mirrors `capns_host::Host`'s almost exactly, with the
//! two roles swapped: a `REQ` here means *we* must service it (the host
//! there routes it to an external backend), while every other frame is
//! first offered to whichever request it continues — here, a locally
//! running handler's argument demux; there, a peer-invoked backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use capns_catalog::Manifest;
use capns_frame::{Frame, FrameId, FrameType};
use capns_host::{HostError, PendingRequests};
use capns_transport::{FrameReader, FrameWriter, Limits};
use capns_urn::CapUrn;
use ciborium::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::frame_sender::TransportFrameSender;
use crate::handler::{CapHandler, DiscardHandler, IdentityHandler, Invocation};
use crate::io_stream::demux_request;
use crate::peer_invoke::PeerInvoker;
use crate::PluginError;

fn meta_u64(meta: &BTreeMap<String, Value>, key: &str) -> Option<u64> {
    meta.get(key).and_then(Value::as_integer).and_then(|i| u64::try_from(i).ok())
}

/// Owns a plugin's manifest and the handlers that service each declared
/// cap, generic over how a handler's output is actually sent
/// ([`crate::FrameSender`]).
pub struct PluginRuntime<F> {
    manifest: Manifest,
    handlers: Vec<(CapUrn, Arc<dyn CapHandler<F>>)>,
}

impl<F> PluginRuntime<F>
where
    F: crate::frame_sender::FrameSender + 'static,
{
    /// Start from `manifest`, auto-registering the mandatory identity
    /// handler (adding the identity cap to the manifest first if it's
    /// missing) and the discard handler if the manifest declares it.
    #[must_use]
    pub fn new(manifest: Manifest) -> Self {
        let manifest = manifest.ensure_identity();
        let mut runtime = Self {
            manifest,
            handlers: Vec::new(),
        };
        let identity_pattern = CapUrn::parse("cap:in=media:;out=media:").expect("identity pattern is valid");
        runtime.register(identity_pattern, Arc::new(IdentityHandler));

        let discard_pattern = CapUrn::parse("cap:in=media:;out=media:void").expect("discard pattern is valid");
        if runtime.manifest.caps.iter().any(|cap| cap.urn == discard_pattern) {
            runtime.register(discard_pattern, Arc::new(DiscardHandler));
        }
        runtime
    }

    /// Register (or override) the handler servicing caps whose URN
    /// `pattern` accepts. Later registrations for an overlapping pattern
    /// take priority only if registered first — first match wins, same
    /// as [`capns_host::LocalPluginRouter`].
    pub fn register(&mut self, pattern: CapUrn, handler: Arc<dyn CapHandler<F>>) {
        self.handlers.insert(0, (pattern, handler));
    }

    /// The manifest this runtime serves.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub(crate) fn find(&self, urn: &CapUrn) -> Option<Arc<dyn CapHandler<F>>> {
        self.handlers.iter().find(|(pattern, _)| pattern.accepts(urn)).map(|(_, handler)| Arc::clone(handler))
    }
}

/// Plugin side of the handshake: read the host's manifest-less HELLO,
/// reply with our own HELLO carrying `manifest_bytes` and our proposed
/// limits, and negotiate independently (both sides compute the same
/// elementwise minimum; no further round trip is needed).
async fn plugin_handshake<R, W>(
    reader: &mut FrameReader<R>,
    writer: &FrameWriter<W>,
    manifest_bytes: Vec<u8>,
    proposed: Limits,
) -> Result<Limits, PluginError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let incoming = reader
        .read_frame()
        .await
        .map_err(|err| PluginError::HandshakeFailed(err.to_string()))?
        .ok_or_else(|| PluginError::HandshakeFailed("host closed before HELLO".to_owned()))?;
    if incoming.frame_type != FrameType::Hello {
        return Err(PluginError::HandshakeFailed(format!("expected HELLO, got {:?}", incoming.frame_type)));
    }
    let meta = incoming
        .meta
        .ok_or_else(|| PluginError::HandshakeFailed("host HELLO missing meta".to_owned()))?;
    let their_max_frame =
        meta_u64(&meta, "max_frame").ok_or_else(|| PluginError::HandshakeFailed("missing max_frame".to_owned()))?;
    let their_max_chunk =
        meta_u64(&meta, "max_chunk").ok_or_else(|| PluginError::HandshakeFailed("missing max_chunk".to_owned()))?;
    let their_max_reorder_buffer = meta_u64(&meta, "max_reorder_buffer");
    let theirs = Limits {
        max_frame: their_max_frame,
        max_chunk: their_max_chunk,
        max_reorder_buffer: their_max_reorder_buffer,
    };

    let mut reply_meta = BTreeMap::new();
    reply_meta.insert("manifest".to_owned(), Value::Bytes(manifest_bytes));
    reply_meta.insert("max_frame".to_owned(), Value::Integer(proposed.max_frame.into()));
    reply_meta.insert("max_chunk".to_owned(), Value::Integer(proposed.max_chunk.into()));
    if let Some(max_reorder_buffer) = proposed.max_reorder_buffer {
        reply_meta.insert("max_reorder_buffer".to_owned(), Value::Integer(max_reorder_buffer.into()));
    }
    let mut reply = Frame::new(2, FrameType::Hello, FrameId::Number(0), 0);
    reply.meta = Some(reply_meta);
    writer
        .write_frame(&reply)
        .await
        .map_err(|err| PluginError::HandshakeFailed(err.to_string()))?;

    Ok(Limits::negotiate(proposed, theirs))
}

async fn write_err<W>(writer: &FrameWriter<W>, id: Uuid, code: &str, message: &str)
where
    W: AsyncWrite + Unpin,
{
    let mut meta = BTreeMap::new();
    meta.insert("code".to_owned(), Value::Text(code.to_owned()));
    meta.insert("message".to_owned(), Value::Text(message.to_owned()));
    let mut frame = Frame::new(2, FrameType::Err, FrameId::Uuid(id), 0);
    frame.meta = Some(meta);
    let _ = writer.write_frame(&frame).await;
}

impl<W> PluginRuntime<TransportFrameSender<W>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Run the CBOR-mode lifecycle to completion: handshake, then read
    /// frames until the host closes the transport, dispatching each `REQ`
    /// to its handler on a spawned task and routing every other frame to
    /// whichever in-flight request (one we're servicing, or one we
    /// ourselves peer-invoked) it continues.
    ///
    /// # Errors
    ///
    /// [`PluginError::HandshakeFailed`] if the handshake fails; otherwise
    /// this only returns once the transport closes, and failures along
    /// the way are logged rather than propagated (a single bad frame must
    /// not bring down an otherwise-healthy connection).
    pub async fn run<R>(
        self,
        mut reader: FrameReader<R>,
        writer: FrameWriter<W>,
        manifest_bytes: Vec<u8>,
        proposed: Limits,
    ) -> Result<(), PluginError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let negotiated = plugin_handshake(&mut reader, &writer, manifest_bytes, proposed).await?;
        let max_chunk = negotiated.max_chunk as usize;

        let sender = Arc::new(TransportFrameSender::new(writer.clone()));
        let pending = Arc::new(PendingRequests::default());
        let peer = Arc::new(PeerInvoker::new(Arc::clone(&sender), Arc::clone(&pending), max_chunk));
        let continuations: Arc<Mutex<HashMap<Uuid, mpsc::Sender<Frame>>>> = Arc::new(Mutex::new(HashMap::new()));
        let runtime = Arc::new(self);

        loop {
            let frame = match reader.read_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    pending.fail_all(HostError::Closed).await;
                    return Ok(());
                }
                Err(err) => {
                    warn!(target: "capns.plugin", error = %err, "transport read failed");
                    pending.fail_all(HostError::ReceiveFailed(err.to_string())).await;
                    return Err(PluginError::ReceiveFailed(err.to_string()));
                }
            };

            match frame.frame_type {
                FrameType::Heartbeat => {
                    let reply = Frame::new(2, FrameType::Heartbeat, frame.id.clone(), 0);
                    if writer.write_frame(&reply).await.is_err() {
                        return Ok(());
                    }
                }
                FrameType::Req => {
                    let FrameId::Uuid(id) = frame.id.clone() else {
                        warn!(target: "capns.plugin", "REQ missing uuid id; dropping");
                        continue;
                    };
                    let Some(cap_text) = frame.cap.clone() else {
                        write_err(&writer, id, "NO_CAP", "REQ missing cap urn").await;
                        continue;
                    };
                    let Ok(cap_urn) = CapUrn::parse(&cap_text) else {
                        write_err(&writer, id, "BAD_CAP_URN", "REQ cap urn did not parse").await;
                        continue;
                    };
                    let Some(handler) = runtime.find(&cap_urn) else {
                        write_err(&writer, id, "NO_HANDLER", &format!("no handler for {cap_urn}")).await;
                        continue;
                    };

                    let (tx, rx) = mpsc::channel(16);
                    continuations.lock().expect("continuations lock poisoned").insert(id, tx);
                    let package = demux_request(frame, rx);
                    let ctx = Invocation::new(id, Arc::clone(&sender), max_chunk, Some(Arc::clone(&peer)));
                    let writer = writer.clone();
                    let continuations = Arc::clone(&continuations);
                    tokio::spawn(async move {
                        match handler.handle(package, ctx).await {
                            Ok(()) => {
                                let end = Frame::new(2, FrameType::End, FrameId::Uuid(id), 0);
                                let _ = writer.write_frame(&end).await;
                            }
                            Err(err) => {
                                write_err(&writer, id, "HANDLER_FAILED", &err.to_string()).await;
                            }
                        }
                        continuations.lock().expect("continuations lock poisoned").remove(&id);
                    });
                }
                other => {
                    let FrameId::Uuid(id) = frame.id.clone() else {
                        continue;
                    };
                    let routed_locally = {
                        let table = continuations.lock().expect("continuations lock poisoned");
                        table.get(&id).cloned()
                    };
                    match routed_locally {
                        Some(tx) => {
                            let terminal = matches!(other, FrameType::End | FrameType::Err);
                            let _ = tx.send(frame).await;
                            if terminal {
                                continuations.lock().expect("continuations lock poisoned").remove(&id);
                            }
                        }
                        None => pending.route(id, frame).await,
                    }
                }
            }
        }
    }
}
