// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-plugin
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Plugin-side runtime (spec.md Component J): a manifest and its cap
//! handlers, runnable either over the CBOR wire protocol against a host
//! ([`PluginRuntime::run`]) or directly as a CLI subcommand
//! ([`cli::run_cli`]) with no host at all.

mod error;
mod frame_sender;
mod handler;
mod io_stream;
mod peer_invoke;
mod runtime;

pub mod cli;

pub use error::PluginError;
pub use frame_sender::{CliFrameSender, FrameSender, TransportFrameSender};
pub use handler::{CapHandler, DiscardHandler, IdentityHandler, Invocation};
pub use io_stream::{InputPackage, InputStream, OutputStream};
pub use peer_invoke::{PeerInvoker, PeerResponse};
pub use runtime::PluginRuntime;
