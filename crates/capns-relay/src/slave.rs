// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`Slave`]: sits inside a plugin-host aggregate and bridges its local
//! runtime connection to a socket reaching a [`crate::Master`] (spec.md
//! §4.K). Runs two forwarding tasks concurrently, one per direction, and
//! returns once either side closes.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use capns_frame::FrameType;
use capns_transport::{FrameReader, FrameWriter, Limits};
use ciborium::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::warn;

use crate::notify::relay_notify_frame;
use crate::RelayError;

/// Bridges a local (plugin-host) connection to a socket connection reaching
/// a master, generic over all four half-streams involved.
pub struct Slave<LR, LW, SR, SW> {
    local_reader: FrameReader<LR>,
    local_writer: FrameWriter<LW>,
    socket_reader: FrameReader<SR>,
    socket_writer: FrameWriter<SW>,
    resource_state: Arc<Mutex<Option<BTreeMap<String, Value>>>>,
}

impl<LR, LW, SR, SW> Slave<LR, LW, SR, SW>
where
    LR: AsyncRead + Unpin + Send + 'static,
    LW: AsyncWrite + Unpin + Send + 'static,
    SR: AsyncRead + Unpin + Send + 'static,
    SW: AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap the four half-streams. `local_*` reach the plugin-host
    /// aggregate this slave bridges; `socket_*` reach the master.
    #[must_use]
    pub fn new(local_reader: FrameReader<LR>, local_writer: FrameWriter<LW>, socket_reader: FrameReader<SR>, socket_writer: FrameWriter<SW>) -> Self {
        Self {
            local_reader,
            local_writer,
            socket_reader,
            socket_writer,
            resource_state: Arc::new(Mutex::new(None)),
        }
    }

    /// The most recent `RELAY_STATE` telemetry pushed down by the master,
    /// if any has arrived yet.
    #[must_use]
    pub fn resource_state(&self) -> Option<BTreeMap<String, Value>> {
        self.resource_state.lock().expect("resource state lock poisoned").clone()
    }

    /// Run both forwarding directions to completion. If `announce` is
    /// given, an initial `RELAY_NOTIFY(manifest, limits)` is sent to the
    /// master before either loop starts (spec.md §4.K: "on first start may
    /// send an initial RELAY_NOTIFY").
    ///
    /// Returns once either side closes; the other direction is then
    /// abandoned, which drops its writer and in turn closes that side's
    /// peer via EOF.
    ///
    /// # Errors
    ///
    /// [`RelayError::SendFailed`] if the initial announcement fails to
    /// send. Failures within either forwarding loop end that loop without
    /// propagating, since a still-healthy peer on the other side shouldn't
    /// be torn down for a single bad frame.
    pub async fn run(self, announce: Option<(Vec<u8>, Limits)>) -> Result<(), RelayError> {
        if let Some((manifest, limits)) = announce {
            self.socket_writer.write_frame(&relay_notify_frame(manifest, limits)).await?;
        }

        let Self {
            mut local_reader,
            local_writer,
            mut socket_reader,
            socket_writer,
            resource_state,
        } = self;

        let to_local = local_writer.clone();
        let socket_to_local = tokio::spawn(async move {
            loop {
                match socket_reader.read_frame().await {
                    Ok(Some(frame)) => match frame.frame_type {
                        FrameType::RelayState => {
                            *resource_state.lock().expect("resource state lock poisoned") = frame.meta;
                        }
                        FrameType::RelayNotify => {
                            warn!(target: "capns.relay", "RELAY_NOTIFY received from master side; ignoring (protocol error)");
                        }
                        _ => {
                            if to_local.write_frame(&frame).await.is_err() {
                                return;
                            }
                        }
                    },
                    Ok(None) | Err(_) => return,
                }
            }
        });

        let local_to_socket = tokio::spawn(async move {
            loop {
                match local_reader.read_frame().await {
                    Ok(Some(frame)) => match frame.frame_type {
                        FrameType::RelayNotify | FrameType::RelayState => {
                            warn!(target: "capns.relay", "dropping RELAY_* frame from the local side; only the slave itself emits these");
                        }
                        _ => {
                            if socket_writer.write_frame(&frame).await.is_err() {
                                return;
                            }
                        }
                    },
                    Ok(None) | Err(_) => return,
                }
            }
        });

        tokio::select! {
            _ = socket_to_local => {}
            _ = local_to_socket => {}
        }
        Ok(())
    }
}
