// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-telemetry
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Ambient observability stack shared by every other capns crate: a
//! `tracing`/`tracing-subscriber` init helper, a bridge from the wire's
//! `LOG` frame (spec.md §3/§7) to `tracing` events, and a minimal
//! heartbeat liveness tracker (spec.md §5: "a separate liveness policy …
//! can invoke `close()` on silent peers").

mod heartbeat;
mod log_bridge;

pub use heartbeat::HeartbeatMonitor;
pub use log_bridge::emit_log_frame;

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber for a capns binary.
///
/// `debug` widens the default filter from `capns=info` to
/// `capns=debug,capns.frame=trace`; either can still be overridden by
/// setting `RUST_LOG` in the environment, since [`EnvFilter::try_from_default_env`]
/// is consulted first.
pub fn init_tracing(debug: bool) {
    let default_filter = if debug { "capns=debug" } else { "capns=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
