// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `media:` URN: a tagged URN restricted to the `media` scheme.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{TagValue, TaggedUrn, UrnError};

/// A `media:` URN, e.g. `media:pdf` or `media:image;png;profile=srgb`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaUrn(TaggedUrn);

impl MediaUrn {
    /// Parse a `media:` URN.
    ///
    /// # Errors
    ///
    /// Returns [`UrnError::UnexpectedScheme`] if `input` is not a `media:`
    /// URN, or any of the grammar errors from [`TaggedUrn::parse`].
    pub fn parse(input: &str) -> Result<Self, UrnError> {
        let inner = TaggedUrn::parse(input)?;
        if inner.scheme() != "media" {
            return Err(UrnError::UnexpectedScheme {
                expected: "media",
                got: inner.scheme().to_owned(),
            });
        }
        Ok(Self(inner))
    }

    /// The underlying generic tagged URN.
    #[must_use]
    pub fn inner(&self) -> &TaggedUrn {
        &self.0
    }

    /// Look up a tag's value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.0.get(key)
    }

    /// `true` if `key` names a marker or valued tag on this URN.
    #[must_use]
    pub fn has_tag(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(TagValue::Wildcard | TagValue::Literal(_)))
    }

    /// Return a new URN with `key` set to `value`.
    #[must_use]
    pub fn with_tag(&self, key: &str, value: TagValue) -> Self {
        Self(self.0.with_tag(key, value))
    }

    /// Return a new URN with `key` removed, if present.
    #[must_use]
    pub fn without_tag(&self, key: &str) -> Self {
        Self(self.0.without_tag(key))
    }

    /// Treating `self` as a pattern, does it accept `instance`?
    #[must_use]
    pub fn accepts(&self, instance: &Self) -> bool {
        self.0.accepts(&instance.0)
    }

    /// `self.conforms_to(pattern)` iff `pattern.accepts(self)`.
    #[must_use]
    pub fn conforms_to(&self, pattern: &Self) -> bool {
        pattern.accepts(self)
    }

    /// Sum of tag grades; see [`TaggedUrn::specificity`].
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

impl fmt::Display for MediaUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for MediaUrn {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MediaUrn {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
