// SPDX-License-Identifier: MIT OR Apache-2.0
//! Negotiated frame-size limits, live-updatable after a handshake.

use std::sync::{Arc, RwLock};

/// Default proposed `max_frame`, in bytes (≈3.5 MiB).
pub const DEFAULT_MAX_FRAME: u64 = 3_670_016;
/// Default proposed `max_chunk`, in bytes (≈256 KiB).
pub const DEFAULT_MAX_CHUNK: u64 = 262_144;
/// Hard ceiling no negotiated `max_frame` may exceed.
pub const HARD_FRAME_LIMIT: u64 = capns_frame::HARD_FRAME_LIMIT as u64;

/// The limits in force for one connection. Negotiated once per handshake,
/// then held behind a [`SharedLimits`] so both the reader and writer side
/// observe the post-handshake values without re-threading them through
/// every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest single encoded frame either side will send or accept.
    pub max_frame: u64,
    /// Largest chunk payload either side will emit when splitting a large
    /// request/response body.
    pub max_chunk: u64,
    /// Protocol v2 only: bound on how many out-of-order chunks a reader
    /// will buffer before failing the stream.
    pub max_reorder_buffer: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame: DEFAULT_MAX_FRAME,
            max_chunk: DEFAULT_MAX_CHUNK,
            max_reorder_buffer: None,
        }
    }
}

impl Limits {
    /// Negotiate the limits in force for a connection: the elementwise
    /// minimum of what each side proposed. `max_reorder_buffer` is only
    /// carried if both sides proposed one (v1 peers omit it entirely).
    #[must_use]
    pub fn negotiate(mine: Self, theirs: Self) -> Self {
        Self {
            max_frame: mine.max_frame.min(theirs.max_frame).min(HARD_FRAME_LIMIT),
            max_chunk: mine.max_chunk.min(theirs.max_chunk),
            max_reorder_buffer: match (mine.max_reorder_buffer, theirs.max_reorder_buffer) {
                (Some(a), Some(b)) => Some(a.min(b)),
                _ => None,
            },
        }
    }
}

/// A [`Limits`] value shared between a connection's reader and writer,
/// swapped in place once at the end of a handshake.
#[derive(Debug, Clone)]
pub struct SharedLimits(Arc<RwLock<Limits>>);

impl SharedLimits {
    /// Wrap an initial (pre-handshake) set of limits.
    #[must_use]
    pub fn new(initial: Limits) -> Self {
        Self(Arc::new(RwLock::new(initial)))
    }

    /// The limits currently in force.
    #[must_use]
    pub fn get(&self) -> Limits {
        *self.0.read().expect("limits lock poisoned")
    }

    /// Install newly negotiated limits.
    pub fn set(&self, limits: Limits) {
        *self.0.write().expect("limits lock poisoned") = limits;
    }
}

impl Default for SharedLimits {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}
