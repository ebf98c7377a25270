// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-planner
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Turns a source/target media pair into an executable [`Plan`]: finds a
//! conversion path through [`capns_graph::MediaGraph`], then resolves each
//! step's argument [`ArgumentBinding`]s against caller-supplied input files
//! and prior steps' outputs.

mod binding;
mod builder;
mod plan;
mod registry;

pub use binding::{resolve_binding, ArgumentBinding, ArgumentResolutionContext, ResolvedArgument, ResolvedSource};
pub use builder::{PlanBuilder, DEFAULT_MAX_DEPTH};
pub use plan::{Plan, PlanStep};
pub use registry::{CapRegistry, CatalogCapRegistry, MediaSpecTableRegistry, MediaUrnRegistry};

/// Errors a [`PlanBuilder`] operation or [`resolve_binding`] call may
/// raise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlannerError {
    /// The caller's request was malformed (e.g. an unfillable required
    /// argument with no binding).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// No path, cap, input file, or prior output matched the request.
    #[error("not found: {0}")]
    NotFound(String),
    /// An internal invariant was violated (a cap vanished mid-plan, an I/O
    /// error reading a resolved path).
    #[error("internal planner error: {0}")]
    Internal(String),
    /// The underlying cap/media registry failed (e.g. a remote registry
    /// call).
    #[error("registry error: {0}")]
    RegistryError(String),
}
