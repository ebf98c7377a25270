// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`Master`]: the mirror of [`crate::Slave`] living in the client process.
//! Extracts the slave's manifest and proposed limits from its initial
//! `RELAY_NOTIFY` during [`Master::connect`], keeps both up to date as
//! further `RELAY_NOTIFY`s arrive, and lets the owner push opaque
//! telemetry down with [`Master::send_state`] (spec.md §4.K).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use capns_frame::{Frame, FrameType};
use capns_transport::{FrameReader, FrameWriter, Limits};
use ciborium::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::notify::{parse_relay_notify, relay_state_frame};
use crate::RelayError;

/// One connection to a slave, as seen from the switch side.
pub struct Master<W> {
    writer: FrameWriter<W>,
    manifest: Arc<Mutex<Vec<u8>>>,
    limits: Arc<Mutex<Limits>>,
    healthy: Arc<AtomicBool>,
}

impl<W> Master<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Read the slave's initial `RELAY_NOTIFY`, then spawn a background
    /// task that keeps applying subsequent ones and forwards every other
    /// frame to `inbound`. Returns the constructed master and a handle to
    /// that task; dropping or awaiting the handle is optional — it ends on
    /// its own once the socket closes.
    ///
    /// # Errors
    ///
    /// [`RelayError::HandshakeFailed`] if the socket closes, errors, or
    /// sends anything but `RELAY_NOTIFY` first.
    pub async fn connect<R>(mut reader: FrameReader<R>, writer: FrameWriter<W>, inbound: mpsc::Sender<Frame>) -> Result<(Self, JoinHandle<()>), RelayError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let first = reader
            .read_frame()
            .await
            .map_err(|err| RelayError::HandshakeFailed(err.to_string()))?
            .ok_or_else(|| RelayError::HandshakeFailed("slave closed before RELAY_NOTIFY".to_owned()))?;
        if first.frame_type != FrameType::RelayNotify {
            return Err(RelayError::HandshakeFailed(format!("expected RELAY_NOTIFY, got {:?}", first.frame_type)));
        }
        let (manifest, limits) = parse_relay_notify(&first)?;

        let healthy = Arc::new(AtomicBool::new(true));
        let manifest = Arc::new(Mutex::new(manifest));
        let limits = Arc::new(Mutex::new(limits));

        let task = tokio::spawn(reader_loop(reader, inbound, Arc::clone(&manifest), Arc::clone(&limits), Arc::clone(&healthy)));

        Ok((
            Self {
                writer,
                manifest,
                limits,
                healthy,
            },
            task,
        ))
    }

    /// The slave's most recently announced manifest, as raw bytes.
    #[must_use]
    pub fn manifest_bytes(&self) -> Vec<u8> {
        self.manifest.lock().expect("manifest lock poisoned").clone()
    }

    /// The slave's most recently announced limits.
    #[must_use]
    pub fn limits(&self) -> Limits {
        *self.limits.lock().expect("limits lock poisoned")
    }

    /// `false` once the reader loop has observed the socket close.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Push opaque telemetry down to the slave.
    ///
    /// # Errors
    ///
    /// [`RelayError::SendFailed`] if the write fails.
    pub async fn send_state(&self, resources: BTreeMap<String, Value>) -> Result<(), RelayError> {
        self.writer.write_frame(&relay_state_frame(resources)).await?;
        Ok(())
    }

    /// Forward an arbitrary frame to the slave (used by
    /// [`crate::Switch`] to deliver routed `REQ`s and continuations).
    ///
    /// # Errors
    ///
    /// [`RelayError::SendFailed`] if the write fails.
    pub async fn send(&self, frame: Frame) -> Result<(), RelayError> {
        self.writer.write_frame(&frame).await?;
        Ok(())
    }
}

async fn reader_loop<R>(
    mut reader: FrameReader<R>,
    inbound: mpsc::Sender<Frame>,
    manifest: Arc<Mutex<Vec<u8>>>,
    limits: Arc<Mutex<Limits>>,
    healthy: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => match frame.frame_type {
                FrameType::RelayNotify => match parse_relay_notify(&frame) {
                    Ok((new_manifest, new_limits)) => {
                        *manifest.lock().expect("manifest lock poisoned") = new_manifest;
                        *limits.lock().expect("limits lock poisoned") = new_limits;
                    }
                    Err(err) => {
                        warn!(target: "capns.relay", error = %err, "malformed RELAY_NOTIFY update; ignoring");
                    }
                },
                FrameType::RelayState => {
                    warn!(target: "capns.relay", "RELAY_STATE received from slave side; discarding (protocol error)");
                }
                _ => {
                    if inbound.send(frame).await.is_err() {
                        return;
                    }
                }
            },
            Ok(None) | Err(_) => {
                healthy.store(false, Ordering::Release);
                return;
            }
        }
    }
}
