// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-host
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Host-side plugin runtime (spec.md Component I): handshake, request
//! issue, response demultiplexing, heartbeats, and servicing cap
//! invocations a plugin makes back into the host ("peer invoke").

mod error;
mod handshake;
mod host;
mod peer;
mod pending;
mod router;

pub use error::HostError;
pub use handshake::host_handshake;
pub use host::Host;
pub use peer::PeerRequests;
pub use pending::{PendingRequests, ResponseChunk};
pub use router::{CapRouter, LocalPluginRouter, PeerRequestHandle, RouteEntry};
