// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `cap:` URN: a tagged URN restricted to the `cap` scheme, carrying
//! two required tags (`in`, `out`) whose values are each either a
//! [`MediaUrn`] string or the wildcard `*`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{MediaUrn, TagValue, TaggedUrn, UrnError};

/// The value of a `cap:` URN's `in` or `out` tag: either unconstrained, or
/// a concrete media type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaField {
    /// `*` — matches or produces any media type.
    Wildcard,
    /// A concrete media type.
    Concrete(MediaUrn),
}

impl MediaField {
    fn from_tag(value: &TagValue) -> Result<Self, UrnError> {
        match value {
            TagValue::Wildcard => Ok(Self::Wildcard),
            TagValue::Literal(s) => Ok(Self::Concrete(MediaUrn::parse(s)?)),
            TagValue::Absent | TagValue::DontCare => Err(UrnError::InvalidFormat(
                "in/out must be a media urn or '*'".to_owned(),
            )),
        }
    }

    fn to_tag_value(&self) -> TagValue {
        match self {
            Self::Wildcard => TagValue::Wildcard,
            Self::Concrete(m) => TagValue::Literal(m.to_string()),
        }
    }

    /// The concrete media type, if any.
    #[must_use]
    pub fn as_concrete(&self) -> Option<&MediaUrn> {
        match self {
            Self::Wildcard => None,
            Self::Concrete(m) => Some(m),
        }
    }

    /// `true` if this field is the unconstrained wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    /// Treating `self` as a pattern field, does it accept `instance`?
    ///
    /// A wildcard pattern accepts anything. A concrete pattern only
    /// accepts a concrete instance, matched via [`MediaUrn::accepts`]; a
    /// wildcard instance never satisfies a concrete pattern, since
    /// declaring `*` makes no guarantee about the actual media type.
    #[must_use]
    pub fn accepts(&self, instance: &Self) -> bool {
        match (self, instance) {
            (Self::Wildcard, _) => true,
            (Self::Concrete(_), Self::Wildcard) => false,
            (Self::Concrete(pattern), Self::Concrete(inst)) => pattern.accepts(inst),
        }
    }
}

impl fmt::Display for MediaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => write!(f, "*"),
            Self::Concrete(m) => write!(f, "{m}"),
        }
    }
}

/// A `cap:` URN, e.g. `cap:in=media:pdf;out="media:image;png";op=extract`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapUrn(TaggedUrn);

impl CapUrn {
    /// Parse a `cap:` URN.
    ///
    /// # Errors
    ///
    /// Returns [`UrnError::MissingIn`]/[`UrnError::MissingOut`] if either
    /// required tag is absent, [`UrnError::UnexpectedScheme`] if the
    /// scheme isn't `cap`, or any grammar error from [`TaggedUrn::parse`].
    pub fn parse(input: &str) -> Result<Self, UrnError> {
        let inner = TaggedUrn::parse(input)?;
        if inner.scheme() != "cap" {
            return Err(UrnError::UnexpectedScheme {
                expected: "cap",
                got: inner.scheme().to_owned(),
            });
        }
        let in_tag = inner.get("in").ok_or(UrnError::MissingIn)?;
        MediaField::from_tag(in_tag)?;
        let out_tag = inner.get("out").ok_or(UrnError::MissingOut)?;
        MediaField::from_tag(out_tag)?;
        Ok(Self(inner))
    }

    /// The underlying generic tagged URN, including `in`/`out` as tags.
    #[must_use]
    pub fn inner(&self) -> &TaggedUrn {
        &self.0
    }

    /// The required `in` field.
    #[must_use]
    pub fn in_field(&self) -> MediaField {
        MediaField::from_tag(self.0.get("in").expect("checked at parse time"))
            .expect("validated at parse time")
    }

    /// The required `out` field.
    #[must_use]
    pub fn out_field(&self) -> MediaField {
        MediaField::from_tag(self.0.get("out").expect("checked at parse time"))
            .expect("validated at parse time")
    }

    /// Look up a non-`in`/`out` classification tag (e.g. `op`, `target`).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.0.get(key)
    }

    /// Return a new URN with its `in` field replaced.
    #[must_use]
    pub fn with_in(&self, field: MediaField) -> Self {
        Self(self.0.with_tag("in", field.to_tag_value()))
    }

    /// Return a new URN with its `out` field replaced.
    #[must_use]
    pub fn with_out(&self, field: MediaField) -> Self {
        Self(self.0.with_tag("out", field.to_tag_value()))
    }

    /// Return a new URN with `key` set to `value`.
    ///
    /// Attempts to mutate `in`/`out` this way are silently rejected — use
    /// [`Self::with_in`]/[`Self::with_out`] instead.
    #[must_use]
    pub fn with_tag(&self, key: &str, value: TagValue) -> Self {
        if key == "in" || key == "out" {
            return self.clone();
        }
        Self(self.0.with_tag(key, value))
    }

    /// Return a new URN with `key` removed.
    ///
    /// Attempts to remove `in`/`out` this way are silently rejected, since
    /// both tags are required.
    #[must_use]
    pub fn without_tag(&self, key: &str) -> Self {
        if key == "in" || key == "out" {
            return self.clone();
        }
        Self(self.0.without_tag(key))
    }

    /// Treating `self` as the cap pattern, does it accept `request`?
    ///
    /// Checks `in` and `out` via [`MediaField::accepts`], and every other
    /// tag via the ordinary [`TaggedUrn`] lattice.
    #[must_use]
    pub fn accepts(&self, request: &Self) -> bool {
        self.in_field().accepts(&request.in_field())
            && self.out_field().accepts(&request.out_field())
            && without_in_out(&self.0).accepts(&without_in_out(&request.0))
    }

    /// `self.conforms_to(pattern)` iff `pattern.accepts(self)`.
    #[must_use]
    pub fn conforms_to(&self, pattern: &Self) -> bool {
        pattern.accepts(self)
    }

    /// Sum of tag grades over every tag, `in`/`out` included.
    #[must_use]
    pub fn specificity(&self) -> u32 {
        self.0.specificity()
    }

    /// `true` iff `self`'s specificity is strictly greater than `other`'s.
    #[must_use]
    pub fn is_more_specific_than(&self, other: &Self) -> bool {
        self.0.is_more_specific_than(&other.0)
    }
}

fn without_in_out(u: &TaggedUrn) -> TaggedUrn {
    u.without_tag("in").without_tag("out")
}

impl fmt::Display for CapUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for CapUrn {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CapUrn {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_in_or_out_errors() {
        assert_eq!(CapUrn::parse("cap:out=*").unwrap_err(), UrnError::MissingIn);
        assert_eq!(
            CapUrn::parse("cap:in=media:pdf").unwrap_err(),
            UrnError::MissingOut
        );
    }

    #[test]
    fn specificity_counts_in_out_and_tags() {
        let u = CapUrn::parse(
            "cap:in=media:pdf;op=extract;out=\"media:image;png\";target=thumbnail",
        )
        .unwrap();
        assert_eq!(u.specificity(), 12);
    }

    #[test]
    fn wildcard_cap_accepts_concrete_request_but_not_reverse() {
        let wildcard = CapUrn::parse("cap:in=media:pdf;out=*;op=*").unwrap();
        let concrete =
            CapUrn::parse("cap:in=media:pdf;out=\"media:image;png\";op=extract").unwrap();
        assert!(wildcard.accepts(&concrete));
        assert!(!concrete.accepts(&wildcard));
    }

    #[test]
    fn with_tag_rejects_in_out_mutation() {
        let cap = CapUrn::parse("cap:in=media:pdf;out=*").unwrap();
        let unchanged = cap.with_tag("in", TagValue::Literal("media:png".to_owned()));
        assert_eq!(unchanged, cap);
    }

    #[test]
    fn with_in_and_with_out_do_mutate() {
        let cap = CapUrn::parse("cap:in=media:pdf;out=*").unwrap();
        let changed = cap.with_in(MediaField::Concrete(MediaUrn::parse("media:png").unwrap()));
        assert_eq!(changed.in_field().as_concrete().unwrap().to_string(), "media:png");
    }

    #[test]
    fn round_trip_preserves_specificity() {
        let original = "cap:in=media:pdf;op=extract;out=\"media:image;png\"";
        let parsed = CapUrn::parse(original).unwrap();
        let reparsed = CapUrn::parse(&parsed.to_string()).unwrap();
        assert_eq!(parsed.specificity(), reparsed.specificity());
    }
}
