// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-level invariants for the tagged-URN algebra.

use capns_urn::{CapUrn, MediaUrn, TagValue, TaggedUrn};
use proptest::prelude::*;

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,8}"
}

fn literal_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,12}"
}

fn tagged_urn_strategy() -> impl Strategy<Value = TaggedUrn> {
    prop::collection::btree_map(key_strategy(), literal_value_strategy(), 0..6).prop_map(|tags| {
        let mut urn = TaggedUrn::new("media").unwrap();
        for (key, value) in tags {
            urn = urn.with_tag(&key, TagValue::Literal(value));
        }
        urn
    })
}

proptest! {
    #[test]
    fn round_trip_is_idempotent(urn in tagged_urn_strategy()) {
        let once = urn.to_string();
        let reparsed = TaggedUrn::parse(&once).unwrap();
        let twice = reparsed.to_string();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn ordering_is_consistent_for_equal_tag_sets(urn in tagged_urn_strategy()) {
        let a = urn.to_string();
        let b = TaggedUrn::parse(&a).unwrap().to_string();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn reflexive_literal_only_urn_accepts_itself(urn in tagged_urn_strategy()) {
        prop_assert!(urn.accepts(&urn));
    }

    #[test]
    fn adding_a_literal_tag_never_decreases_specificity(
        urn in tagged_urn_strategy(),
        key in key_strategy(),
        value in literal_value_strategy(),
    ) {
        prop_assume!(urn.get(&key).is_none());
        let extended = urn.with_tag(&key, TagValue::Literal(value));
        prop_assert!(extended.specificity() >= urn.specificity());
    }
}

#[test]
fn serde_round_trips_media_urn() {
    let m = MediaUrn::parse("media:image;png;profile=srgb").unwrap();
    let json = serde_json::to_string(&m).unwrap();
    let back: MediaUrn = serde_json::from_str(&json).unwrap();
    assert_eq!(m, back);
}

#[test]
fn serde_round_trips_cap_urn() {
    let c = CapUrn::parse("cap:in=media:pdf;out=*;op=extract").unwrap();
    let json = serde_json::to_string(&c).unwrap();
    let back: CapUrn = serde_json::from_str(&json).unwrap();
    assert_eq!(c, back);
}

#[test]
fn serde_rejects_malformed_cap_urn() {
    let err = serde_json::from_str::<CapUrn>(r#""cap:in=media:pdf""#).unwrap_err();
    assert!(err.to_string().contains("out"));
}
