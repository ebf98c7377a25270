// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`Plan`]: an executable, fully-bound (or slotted) sequence of cap
//! invocations, built by [`crate::PlanBuilder::build_plan`].

use std::collections::HashMap;

use capns_cardinality::CardinalityPattern;
use capns_urn::CapUrn;
use serde::{Deserialize, Serialize};

use crate::ArgumentBinding;

/// One step of a [`Plan`]: a single cap invocation with a binding for each
/// of its declared arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Unique id for this step within the plan, used by
    /// [`ArgumentBinding::PreviousOutput`] in later steps.
    pub node_id: String,
    /// The cap this step invokes.
    pub cap_urn: CapUrn,
    /// The registry (plugin) name this cap was registered under.
    pub registry_name: String,
    /// Bindings, keyed by the cap's argument media URN text (an argument
    /// with no declared name is keyed by its position, `"0"`, `"1"`, …).
    pub bindings: HashMap<String, ArgumentBinding>,
}

/// A built plan: an ordered sequence of steps plus the cardinality
/// analysis of the path they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// The steps to execute, in order.
    pub steps: Vec<PlanStep>,
    /// Overall shape of the conversion (one-to-one, one-to-many, …).
    pub pattern: CardinalityPattern,
    /// Step indices requiring fan-out (see `capns_cardinality`).
    pub fan_out_points: Vec<usize>,
}

impl Plan {
    /// `true` iff every step's every binding is resolved (no
    /// [`ArgumentBinding::Slot`] remains).
    #[must_use]
    pub fn is_fully_bound(&self) -> bool {
        self.steps
            .iter()
            .flat_map(|step| step.bindings.values())
            .all(|binding| !matches!(binding, ArgumentBinding::Slot { .. }))
    }

    /// Every unresolved slot across the whole plan, as `(node_id, binding
    /// key, slot name)` triples.
    #[must_use]
    pub fn open_slots(&self) -> Vec<(&str, &str, &str)> {
        self.steps
            .iter()
            .flat_map(|step| {
                step.bindings.iter().filter_map(move |(key, binding)| match binding {
                    ArgumentBinding::Slot { name, .. } => {
                        Some((step.node_id.as_str(), key.as_str(), name.as_str()))
                    }
                    _ => None,
                })
            })
            .collect()
    }
}
