// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-cardinality
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Classifies a media URN's cardinality (single value, sequence, or
//! guaranteed-nonempty sequence) and, given a chain of such
//! classifications, the shape of the overall conversion (`OneToOne`,
//! `OneToMany`, …) and the points along it that require fan-out.

use capns_graph::Edge;
use capns_media::{is_collection, is_list};
use capns_urn::MediaUrn;
use serde::{Deserialize, Serialize};

/// How many values a media URN represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// Exactly one value.
    Single,
    /// Zero or more values (the `list` marker).
    Sequence,
    /// One or more values (the `collection` marker without `list`).
    AtLeastOne,
}

impl Cardinality {
    /// `true` for [`Self::Sequence`] or [`Self::AtLeastOne`] — anything
    /// that is not a single scalar value.
    #[must_use]
    pub fn is_many(self) -> bool {
        !matches!(self, Self::Single)
    }
}

/// Classify a media URN's cardinality from its marker tags.
///
/// `Sequence` iff the URN carries the `list` marker, matching spec §4.E
/// exactly. `AtLeastOne` covers the `collection` marker on its own — a
/// non-empty grouping that isn't declared as an ordinary `list`. Anything
/// without either marker is `Single`.
#[must_use]
pub fn cardinality_of(urn: &MediaUrn) -> Cardinality {
    if is_list(urn) {
        Cardinality::Sequence
    } else if is_collection(urn) {
        Cardinality::AtLeastOne
    } else {
        Cardinality::Single
    }
}

/// The overall shape of a conversion chain, from its first step's input
/// cardinality to its last step's output cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardinalityPattern {
    /// Single input, single output.
    OneToOne,
    /// Single input, many outputs.
    OneToMany,
    /// Many inputs, single output.
    ManyToOne,
    /// Many inputs, many outputs.
    ManyToMany,
}

/// Classify a chain from its endpoint cardinalities.
#[must_use]
pub fn classify_chain(first_in: Cardinality, last_out: Cardinality) -> CardinalityPattern {
    match (first_in.is_many(), last_out.is_many()) {
        (false, false) => CardinalityPattern::OneToOne,
        (false, true) => CardinalityPattern::OneToMany,
        (true, false) => CardinalityPattern::ManyToOne,
        (true, true) => CardinalityPattern::ManyToMany,
    }
}

/// How a single step boundary (one step's output feeding the next step's
/// input) must be adapted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepAdaptation {
    /// Cardinalities already line up; no adaptation needed.
    Direct,
    /// The source produces a single value but the target expects a
    /// sequence — wrap the value in a one-element array.
    WrapInArray,
    /// The source produces a sequence but the target expects a single
    /// value — the step must be invoked once per element (fan-out).
    RequiresFanOut,
}

/// Classify the boundary between a step's output cardinality and the next
/// step's input cardinality.
#[must_use]
pub fn classify_step_pair(source_out: Cardinality, target_in: Cardinality) -> StepAdaptation {
    match (source_out.is_many(), target_in.is_many()) {
        (false, false) | (true, true) => StepAdaptation::Direct,
        (false, true) => StepAdaptation::WrapInArray,
        (true, false) => StepAdaptation::RequiresFanOut,
    }
}

/// Analyze a conversion path's cardinality: the overall chain pattern, the
/// per-boundary adaptation, and the step indices requiring fan-out.
///
/// `fan_out_points` indexes into `path`: index `i` means the boundary
/// between `path[i]`'s output and `path[i + 1]`'s input requires
/// fan-out. Empty paths (source already equals target) report
/// [`CardinalityPattern::OneToOne`] with no fan-out points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCardinality {
    /// The overall shape of the path.
    pub pattern: CardinalityPattern,
    /// Per-boundary adaptation, one entry per step-to-step transition
    /// (`path.len().saturating_sub(1)` entries).
    pub adaptations: Vec<StepAdaptation>,
    /// Indices of boundaries classified as [`StepAdaptation::RequiresFanOut`].
    pub fan_out_points: Vec<usize>,
}

/// Analyze the cardinality shape of a path of [`Edge`]s.
#[must_use]
pub fn analyze_path_cardinality(path: &[Edge]) -> PathCardinality {
    if path.is_empty() {
        return PathCardinality {
            pattern: CardinalityPattern::OneToOne,
            adaptations: Vec::new(),
            fan_out_points: Vec::new(),
        };
    }

    let cardinalities: Vec<(Cardinality, Cardinality)> = path
        .iter()
        .map(|edge| {
            let in_field = edge.cap_urn.in_field();
            let out_field = edge.cap_urn.out_field();
            let in_card = in_field
                .as_concrete()
                .map_or(Cardinality::Single, cardinality_of);
            let out_card = out_field
                .as_concrete()
                .map_or(Cardinality::Single, cardinality_of);
            (in_card, out_card)
        })
        .collect();

    let first_in = cardinalities[0].0;
    let last_out = cardinalities[cardinalities.len() - 1].1;
    let pattern = classify_chain(first_in, last_out);

    let mut adaptations = Vec::with_capacity(cardinalities.len().saturating_sub(1));
    let mut fan_out_points = Vec::new();
    for (index, window) in cardinalities.windows(2).enumerate() {
        let adaptation = classify_step_pair(window[0].1, window[1].0);
        if adaptation == StepAdaptation::RequiresFanOut {
            fan_out_points.push(index);
        }
        adaptations.push(adaptation);
    }

    PathCardinality {
        pattern,
        adaptations,
        fan_out_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capns_catalog::Cap;
    use capns_urn::CapUrn;

    fn cap(urn: &str) -> Cap {
        Cap {
            urn: CapUrn::parse(urn).unwrap(),
            title: urn.to_owned(),
            description: None,
            command: "c".into(),
            args: vec![],
            output: None,
            media_specs: vec![],
        }
    }

    fn edge(cap: &Cap) -> Edge {
        Edge {
            from: cap.urn.in_field().as_concrete().unwrap().to_string(),
            to: cap.urn.out_field().as_concrete().unwrap().to_string(),
            cap_urn: cap.urn.clone(),
            registry_name: "plugin-a".to_owned(),
            specificity: cap.urn.specificity(),
        }
    }

    #[test]
    fn cardinality_of_respects_list_and_collection_markers() {
        assert_eq!(
            cardinality_of(&MediaUrn::parse("media:pdf").unwrap()),
            Cardinality::Single
        );
        assert_eq!(
            cardinality_of(&MediaUrn::parse("media:json;list").unwrap()),
            Cardinality::Sequence
        );
        assert_eq!(
            cardinality_of(&MediaUrn::parse("media:json;collection").unwrap()),
            Cardinality::AtLeastOne
        );
    }

    #[test]
    fn step_pair_classification_matches_spec_table() {
        assert_eq!(
            classify_step_pair(Cardinality::Single, Cardinality::Single),
            StepAdaptation::Direct
        );
        assert_eq!(
            classify_step_pair(Cardinality::Single, Cardinality::Sequence),
            StepAdaptation::WrapInArray
        );
        assert_eq!(
            classify_step_pair(Cardinality::Sequence, Cardinality::Single),
            StepAdaptation::RequiresFanOut
        );
        assert_eq!(
            classify_step_pair(Cardinality::Sequence, Cardinality::AtLeastOne),
            StepAdaptation::Direct
        );
    }

    #[test]
    fn analyze_path_cardinality_flags_fan_out_point() {
        // `split` produces a *sequence* of pages; `render` consumes one page
        // at a time, so the in/out media types deliberately don't line up
        // as the same graph node — this exercises the fan-out boundary
        // directly rather than via `MediaGraph::find_path`.
        let split = cap("cap:in=media:pdf;out=\"media:json;list\";op=split-pages");
        let render = cap("cap:in=media:json;out=\"media:image;png\";op=render");
        let path = vec![edge(&split), edge(&render)];
        let analysis = analyze_path_cardinality(&path);
        assert_eq!(analysis.pattern, CardinalityPattern::OneToOne);
        assert_eq!(analysis.fan_out_points, vec![0]);
        assert_eq!(analysis.adaptations, vec![StepAdaptation::RequiresFanOut]);
    }

    #[test]
    fn empty_path_is_one_to_one_with_no_fan_out() {
        let analysis = analyze_path_cardinality(&[]);
        assert_eq!(analysis.pattern, CardinalityPattern::OneToOne);
        assert!(analysis.fan_out_points.is_empty());
    }
}
