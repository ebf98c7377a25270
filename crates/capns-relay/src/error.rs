// SPDX-License-Identifier: MIT OR Apache-2.0
//! Relay error taxonomy, mirroring `capns_host::HostError`'s per-failure
//! shape for the components that sit between a plugin-host aggregate and a
//! switch (spec.md §4.K).

use uuid::Uuid;

/// Errors raised by [`crate::Slave`], [`crate::Master`], and [`crate::Switch`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum RelayError {
    /// The initial `RELAY_NOTIFY` a master expects during `connect` never
    /// arrived, or arrived malformed.
    #[error("relay handshake failed: {0}")]
    HandshakeFailed(String),
    /// Writing a frame to a socket or local connection failed.
    #[error("failed to send frame: {0}")]
    SendFailed(String),
    /// Reading a frame from a socket or local connection failed.
    #[error("failed to receive frame: {0}")]
    ReceiveFailed(String),
    /// A master's manifest did not deserialize.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
    /// No registered master's cap urn accepts the requested urn.
    #[error("no master accepts cap: {0}")]
    NoRoute(String),
    /// A continuation frame named a request id with no open routing entry.
    #[error("unknown request id: {0}")]
    UnknownRequest(Uuid),
    /// The request's destination master has already died.
    #[error("master {0} is dead")]
    MasterDead(usize),
    /// Every registered master has died; the switch has nothing left to
    /// route to.
    #[error("all masters are dead")]
    AllMastersDead,
}

impl From<capns_transport::TransportError> for RelayError {
    fn from(err: capns_transport::TransportError) -> Self {
        Self::SendFailed(err.to_string())
    }
}
