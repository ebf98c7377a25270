// SPDX-License-Identifier: MIT OR Apache-2.0
//! The handler-facing shape of a request's arguments and its outputs.
//!
//! A `REQ`'s argument frames arrive in three distinct encodings (spec.md
//! §4.I "Request issue"), all of which a handler should see the same way:
//!
//! - a single `REQ` frame carrying an inline payload (small single-arg
//!   requests never split into chunks);
//! - `REQ` with an empty payload, then `CHUNK`×n, ending with a final
//!   frame of type `END` that itself carries the last slice of payload
//!   (the legacy single-argument chunked form);
//! - `REQ` with an empty payload, then one or more
//!   `STREAM_START`/`CHUNK`×n/`STREAM_END` sequences, each a distinct
//!   named argument (protocol v2's `requestWithArguments`).
//!
//! [`demux_request`] normalizes all three into a sequence of
//! [`InputStream`]s delivered through an [`InputPackage`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use capns_frame::{Frame, FrameId, FrameType};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::frame_sender::FrameSender;
use crate::PluginError;

/// One argument stream delivered to a handler: its declared media type (if
/// the sender re-stated one) and a channel of raw chunks in arrival order.
pub struct InputStream {
    /// The `streamId` this argument arrived under (empty string for the
    /// legacy single-default-argument encodings).
    pub stream_id: String,
    /// Media URN carried on `STREAM_START`, if this was a v2-style named
    /// argument.
    pub media_urn: Option<String>,
    chunks: mpsc::Receiver<Vec<u8>>,
}

impl InputStream {
    /// Build an already-populated or still-filling input stream directly,
    /// bypassing [`demux_request`]. Used by CLI mode, where an argument's
    /// bytes come from argv/stdin rather than wire frames.
    pub(crate) fn new(stream_id: String, media_urn: Option<String>, chunks: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            stream_id,
            media_urn,
            chunks,
        }
    }

    /// The next chunk of this argument's bytes, or `None` once it's
    /// exhausted.
    pub async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        self.chunks.recv().await
    }

    /// Buffer the whole argument into memory. Convenient for handlers
    /// whose cap genuinely needs the complete bytes (e.g. to parse a
    /// small JSON document) rather than processing it incrementally.
    pub async fn read_to_end(mut self) -> Vec<u8> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.next_chunk().await {
            buf.extend_from_slice(&chunk);
        }
        buf
    }
}

/// The full set of argument streams for one request, delivered as they
/// start rather than all at once.
pub struct InputPackage {
    streams: mpsc::Receiver<InputStream>,
}

impl InputPackage {
    /// Wrap an already-built channel of streams. Used by CLI mode, which
    /// has no frames to demultiplex.
    pub(crate) fn new(streams: mpsc::Receiver<InputStream>) -> Self {
        Self { streams }
    }

    /// The next argument stream to begin, or `None` once the request's
    /// argument phase has ended.
    pub async fn next_stream(&mut self) -> Option<InputStream> {
        self.streams.recv().await
    }
}

/// Drive the demultiplexing state machine for one request: `initial` is
/// the `REQ` frame itself (which may already carry the request's only
/// argument inline); `frames` yields every subsequent frame addressed to
/// this request id until its `END`/`ERR`. Returns an [`InputPackage`]
/// immediately; the demultiplexing itself runs on a spawned task so the
/// caller can start reading argument streams as they arrive rather than
/// waiting for the whole request to land.
pub(crate) fn demux_request(initial: Frame, mut frames: mpsc::Receiver<Frame>) -> InputPackage {
    let (streams_tx, streams_rx) = mpsc::channel(8);

    tokio::spawn(async move {
        let mut named: HashMap<String, mpsc::Sender<Vec<u8>>> = HashMap::new();
        let mut default: Option<mpsc::Sender<Vec<u8>>> = None;

        if let Some(payload) = initial.payload {
            if !payload.is_empty() {
                let (tx, rx) = mpsc::channel(1);
                let _ = tx.send(payload).await;
                let _ = streams_tx
                    .send(InputStream {
                        stream_id: String::new(),
                        media_urn: initial.media_urn.clone(),
                        chunks: rx,
                    })
                    .await;
                // A single inline payload is the whole argument; no more
                // frames will refine it further.
                return;
            }
        }

        while let Some(frame) = frames.recv().await {
            match frame.frame_type {
                FrameType::StreamStart => {
                    let stream_id = frame.stream_id.unwrap_or_default();
                    let (tx, rx) = mpsc::channel(8);
                    named.insert(stream_id.clone(), tx);
                    let _ = streams_tx
                        .send(InputStream {
                            stream_id,
                            media_urn: frame.media_urn,
                            chunks: rx,
                        })
                        .await;
                }
                FrameType::Chunk => {
                    let payload = frame.payload.unwrap_or_default();
                    match frame.stream_id {
                        Some(stream_id) => {
                            if let Some(tx) = named.get(&stream_id) {
                                let _ = tx.send(payload).await;
                            }
                        }
                        None => {
                            let tx = default.get_or_insert_with(|| {
                                let (tx, rx) = mpsc::channel(8);
                                let streams_tx = streams_tx.clone();
                                tokio::spawn(async move {
                                    let _ = streams_tx
                                        .send(InputStream {
                                            stream_id: String::new(),
                                            media_urn: None,
                                            chunks: rx,
                                        })
                                        .await;
                                });
                                tx
                            });
                            let _ = tx.send(payload).await;
                        }
                    }
                }
                FrameType::StreamEnd => {
                    let stream_id = frame.stream_id.unwrap_or_default();
                    named.remove(&stream_id);
                }
                FrameType::End => {
                    if let Some(payload) = frame.payload {
                        if let Some(tx) = default.take() {
                            let _ = tx.send(payload).await;
                        }
                    }
                    break;
                }
                FrameType::Err => {
                    warn!(target: "capns.plugin", "request aborted by peer ERR during argument phase");
                    break;
                }
                other => {
                    warn!(target: "capns.plugin", frame_type = ?other, "unexpected frame during argument phase");
                }
            }
        }
        // Dropping `named`/`default`/`streams_tx` here closes every
        // outstanding channel, so in-flight `InputStream`s see clean EOF.
    });

    InputPackage { streams: streams_rx }
}

/// One named output of a request, writing through a [`FrameSender`].
/// Always emits `STREAM_START` before its first `CHUNK`, and `STREAM_END`
/// on [`OutputStream::close`] — even if never written to, so every
/// declared output appears on the wire.
pub struct OutputStream<F> {
    sender: Arc<F>,
    id: Uuid,
    stream_id: String,
    media_urn: String,
    max_chunk: usize,
    seq: AtomicU32,
    started: AtomicBool,
}

impl<F> OutputStream<F>
where
    F: FrameSender,
{
    pub(crate) fn new(sender: Arc<F>, id: Uuid, stream_id: impl Into<String>, media_urn: impl Into<String>, max_chunk: usize) -> Self {
        Self {
            sender,
            id,
            stream_id: stream_id.into(),
            media_urn: media_urn.into(),
            max_chunk: max_chunk.max(1),
            seq: AtomicU32::new(1),
            started: AtomicBool::new(false),
        }
    }

    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    async fn ensure_started(&self) -> Result<(), PluginError> {
        if !self.started.swap(true, Ordering::AcqRel) {
            let frame = Frame::new(2, FrameType::StreamStart, FrameId::Uuid(self.id), self.next_seq())
                .with_stream_id(self.stream_id.clone())
                .with_media_urn(self.media_urn.clone());
            self.sender.send(frame).await?;
        }
        Ok(())
    }

    /// Write bytes to this output, splitting into `CHUNK` frames no
    /// larger than the negotiated `max_chunk`.
    pub async fn write(&self, data: &[u8]) -> Result<(), PluginError> {
        self.ensure_started().await?;
        for window in data.chunks(self.max_chunk) {
            let frame = Frame::new(2, FrameType::Chunk, FrameId::Uuid(self.id), self.next_seq())
                .with_stream_id(self.stream_id.clone())
                .with_payload("application/octet-stream", window.to_vec());
            self.sender.send(frame).await?;
        }
        Ok(())
    }

    /// Finish this output stream.
    pub async fn close(&self) -> Result<(), PluginError> {
        self.ensure_started().await?;
        let frame =
            Frame::new(2, FrameType::StreamEnd, FrameId::Uuid(self.id), self.next_seq()).with_stream_id(self.stream_id.clone());
        self.sender.send(frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_sender::CliFrameSender;

    #[tokio::test]
    async fn inline_payload_is_a_single_complete_stream() {
        let req = Frame::new(2, FrameType::Req, FrameId::Uuid(Uuid::new_v4()), 0)
            .with_cap("cap:in=media:txt;out=media:txt")
            .with_payload("text/plain", b"hello".to_vec());
        let (_tx, rx) = mpsc::channel(1);
        let mut package = demux_request(req, rx);
        let stream = package.next_stream().await.expect("one stream");
        assert_eq!(stream.read_to_end().await, b"hello");
        assert!(package.next_stream().await.is_none());
    }

    #[tokio::test]
    async fn chunked_legacy_payload_ends_on_end_frame_with_payload() {
        let req = Frame::new(2, FrameType::Req, FrameId::Uuid(Uuid::new_v4()), 0).with_cap("cap:in=media:txt;out=media:txt");
        let id = req.id.clone();
        let (tx, rx) = mpsc::channel(4);
        let mut package = demux_request(req, rx);

        let chunk = Frame::new(2, FrameType::Chunk, id.clone(), 1).with_payload("application/octet-stream", b"foo".to_vec());
        tx.send(chunk).await.unwrap();
        let end = Frame::new(2, FrameType::End, id, 2).with_payload("application/octet-stream", b"bar".to_vec());
        tx.send(end).await.unwrap();
        drop(tx);

        let stream = package.next_stream().await.expect("one stream");
        assert_eq!(stream.read_to_end().await, b"foobar");
    }

    #[tokio::test]
    async fn named_arguments_are_delivered_as_separate_streams() {
        let req = Frame::new(2, FrameType::Req, FrameId::Uuid(Uuid::new_v4()), 0).with_cap("cap:in=media:txt;out=media:txt");
        let id = req.id.clone();
        let (tx, rx) = mpsc::channel(8);
        let mut package = demux_request(req, rx);

        let start_a = Frame::new(2, FrameType::StreamStart, id.clone(), 1)
            .with_stream_id("a")
            .with_media_urn("media:txt");
        tx.send(start_a).await.unwrap();
        let chunk_a = Frame::new(2, FrameType::Chunk, id.clone(), 2)
            .with_stream_id("a")
            .with_payload("text/plain", b"A".to_vec());
        tx.send(chunk_a).await.unwrap();
        let end_a = Frame::new(2, FrameType::StreamEnd, id.clone(), 3).with_stream_id("a");
        tx.send(end_a).await.unwrap();

        let start_b = Frame::new(2, FrameType::StreamStart, id.clone(), 4).with_stream_id("b");
        tx.send(start_b).await.unwrap();
        let chunk_b = Frame::new(2, FrameType::Chunk, id.clone(), 5)
            .with_stream_id("b")
            .with_payload("text/plain", b"B".to_vec());
        tx.send(chunk_b).await.unwrap();
        let end_b = Frame::new(2, FrameType::StreamEnd, id.clone(), 6).with_stream_id("b");
        tx.send(end_b).await.unwrap();

        let terminator = Frame::new(2, FrameType::End, id, 7);
        tx.send(terminator).await.unwrap();
        drop(tx);

        let first = package.next_stream().await.expect("stream a");
        assert_eq!(first.stream_id, "a");
        assert_eq!(first.read_to_end().await, b"A");

        let second = package.next_stream().await.expect("stream b");
        assert_eq!(second.stream_id, "b");
        assert_eq!(second.read_to_end().await, b"B");

        assert!(package.next_stream().await.is_none());
    }

    #[tokio::test]
    async fn output_stream_emits_start_then_end_even_when_never_written() {
        let mut buf = Vec::new();
        let sender = Arc::new(CliFrameSender::new(&mut buf));
        let id = Uuid::new_v4();
        let output = OutputStream::new(sender, id, "", "media:txt", 1024);
        output.close().await.unwrap();
        // CliFrameSender drops STREAM_START/STREAM_END, so an
        // untouched output produces no stdout bytes at all.
        drop(output);
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn output_stream_splits_writes_across_max_chunk() {
        let mut buf = Vec::new();
        let sender = Arc::new(CliFrameSender::new(&mut buf));
        let id = Uuid::new_v4();
        let output = OutputStream::new(sender, id, "", "media:txt", 2);
        output.write(b"abcde").await.unwrap();
        output.close().await.unwrap();
        drop(output);
        assert_eq!(buf, b"abcde");
    }
}
