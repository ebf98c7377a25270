// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-relay
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Frame relay (spec.md Component K): a [`Slave`] bridges a plugin-host
//! aggregate's local connection to a socket reaching a [`Master`], which
//! interprets the slave's control-plane announcements; a [`Switch`] sits
//! above N masters and routes requests and their continuations across
//! them by aggregate cap urn.

mod error;
mod master;
mod notify;
mod slave;
mod switch;

pub use error::RelayError;
pub use master::Master;
pub use notify::relay_state_frame;
pub use slave::Slave;
pub use switch::{RouteEndpoint, Switch};
