// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-catalog
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Cap definitions, manifests, and the in-memory [`CapCatalog`] that stores
//! them with specificity-ordered lookup.

mod catalog;
mod manifest;

pub use catalog::{CapCatalog, RegisteredCap};
pub use manifest::{Arg, Cap, Manifest, ManifestError, Output, Source};
