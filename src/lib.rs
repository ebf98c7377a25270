// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns
#![deny(unsafe_code)]
//!
//! Umbrella crate re-exporting the capns workspace's public surface.
//!
//! capns is a capability-oriented plugin runtime and media routing fabric:
//! producers ("caps") are typed, media-tagged functions identified by
//! structured URNs, executed in-process, over a binary frame transport to
//! child processes, or relayed across multi-hop topologies. See the
//! individual crates for details:
//!
//! - [`capns_urn`] — tagged-URN algebra (`cap:` / `media:` parsing, matching, specificity)
//! - [`capns_media`] — media URN resolution to content-type/profile/schema descriptors
//! - [`capns_catalog`] — in-memory capability catalog and manifests
//! - [`capns_graph`] — the media conversion graph and path-finding
//! - [`capns_cardinality`] — scalar/list cardinality analysis
//! - [`capns_planner`] — execution plan synthesis
//! - [`capns_frame`] — the binary CBOR frame wire format
//! - [`capns_transport`] — length-prefixed frame transport
//! - [`capns_host`] — host-side plugin process runtime
//! - [`capns_plugin`] — plugin-side runtime
//! - [`capns_relay`] — relay slave/master/switch
//! - [`capns_config`] — environment configuration and registry cache
//! - [`capns_telemetry`] — tracing setup helpers

pub use capns_cardinality as cardinality;
pub use capns_catalog as catalog;
pub use capns_config as config;
pub use capns_frame as frame;
pub use capns_graph as graph;
pub use capns_host as host;
pub use capns_media as media;
pub use capns_planner as planner;
pub use capns_plugin as plugin;
pub use capns_relay as relay;
pub use capns_telemetry as telemetry;
pub use capns_transport as transport;
pub use capns_urn as urn;
