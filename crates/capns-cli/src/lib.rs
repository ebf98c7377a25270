// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-cli
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Thin binaries on top of the capns library crates: `capns-plugin-cli`
//! (a reference plugin exercising [`capns_plugin::PluginRuntime`] in both
//! its CBOR and CLI-fallback modes) and `capns-relay-cli` (a TCP-listening
//! [`capns_relay::Switch`] front end). The library half holds what both
//! modes of the plugin binary share; routing and framing logic all stays
//! in the crates being driven.

pub mod plugin;
pub mod relay;
