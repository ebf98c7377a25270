// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-urn
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Tagged-URN algebra: parsing, canonicalization, pattern/instance matching,
//! and graded specificity for `cap:` and `media:` URNs.
//!
//! A tagged URN has the canonical textual form
//! `<scheme>:key1=value1;key2=value2;...;markerTag`. Keys are unique,
//! lowercase, and sorted ascending in canonical output. A bare key with no
//! `=value` is a *marker tag*, equivalent to an explicit wildcard value.
//!
//! Values live in a four-valued constraint lattice used during matching:
//! `*` (wildcard / present with any value), `!` (must be absent), `?`
//! (don't care, always matches), or a literal string.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cap;
pub mod media;

pub use cap::{CapUrn, MediaField};
pub use media::MediaUrn;

/// Errors raised while parsing or mutating tagged URNs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrnError {
    /// The overall string did not match `scheme:taglist`.
    #[error("invalid urn format: {0}")]
    InvalidFormat(String),
    /// No `scheme:` prefix was found at all.
    #[error("missing scheme")]
    MissingScheme,
    /// A `;`-separated segment was empty (e.g. two consecutive `;;`).
    #[error("empty tag at position {0}")]
    EmptyTag(usize),
    /// A tag did not match `key` or `key=value`.
    #[error("invalid tag format: {0:?}")]
    InvalidTagFormat(String),
    /// The same key appeared more than once.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    /// A key was entirely numeric, which the grammar disallows.
    #[error("numeric key not allowed: {0}")]
    NumericKey(String),
    /// A quoted value was never closed.
    #[error("unterminated quoted value")]
    UnterminatedQuote,
    /// An escape sequence other than `\"` or `\\` appeared in a quoted value.
    #[error("invalid escape sequence: \\{0}")]
    InvalidEscapeSequence(char),
    /// A `cap:` URN lacked its required `in` tag.
    #[error("cap urn missing required 'in' tag")]
    MissingIn,
    /// A `cap:` URN lacked its required `out` tag.
    #[error("cap urn missing required 'out' tag")]
    MissingOut,
    /// The scheme did not match what the caller expected (`media` or `cap`).
    #[error("unexpected scheme: expected {expected}, got {got}")]
    UnexpectedScheme {
        /// Scheme the caller required.
        expected: &'static str,
        /// Scheme actually present in the string.
        got: String,
    },
}

/// A value in the four-valued tag constraint lattice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TagValue {
    /// `*` — present, matching any value.
    Wildcard,
    /// `!` — the key must be absent.
    Absent,
    /// `?` — don't care; always matches.
    DontCare,
    /// A concrete literal value.
    Literal(String),
}

impl TagValue {
    /// Grade used by [`TaggedUrn::specificity`]: exact=3, wildcard=2, absent=1, don't-care=0.
    #[must_use]
    pub fn grade(&self) -> u32 {
        match self {
            Self::Literal(_) => 3,
            Self::Wildcard => 2,
            Self::Absent => 1,
            Self::DontCare => 0,
        }
    }

    /// `true` for tag states that describe a genuinely present value.
    fn is_present(&self) -> bool {
        matches!(self, Self::Wildcard | Self::Literal(_))
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => write!(f, "*"),
            Self::Absent => write!(f, "!"),
            Self::DontCare => write!(f, "?"),
            Self::Literal(s) => write!(f, "{}", quote_if_needed(s)),
        }
    }
}

const RESERVED: [char; 4] = [';', '=', '"', '\\'];

fn quote_if_needed(value: &str) -> String {
    if value.chars().any(|c| RESERVED.contains(&c)) {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('"');
        for c in value.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
        out
    } else {
        value.to_owned()
    }
}

/// A parsed, immutable tagged URN: `<scheme>:key1=value1;key2=value2;...`.
///
/// Mutation methods (`with_tag`/`without_tag`) return a new value; the
/// receiver is never modified in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaggedUrn {
    scheme: String,
    tags: BTreeMap<String, TagValue>,
}

impl TaggedUrn {
    /// Build an empty tagged URN for `scheme`, with no tags.
    ///
    /// # Errors
    ///
    /// Returns [`UrnError::InvalidFormat`] if `scheme` doesn't match the
    /// scheme grammar.
    pub fn new(scheme: &str) -> Result<Self, UrnError> {
        validate_scheme(scheme)?;
        Ok(Self {
            scheme: scheme.to_owned(),
            tags: BTreeMap::new(),
        })
    }

    /// Parse a tagged URN of any scheme.
    ///
    /// # Errors
    ///
    /// See [`UrnError`] for the full taxonomy of malformed input.
    pub fn parse(input: &str) -> Result<Self, UrnError> {
        let (scheme, rest) = input
            .split_once(':')
            .ok_or(UrnError::MissingScheme)?;
        validate_scheme(scheme)?;

        let mut tags = BTreeMap::new();
        if !rest.is_empty() {
            for (idx, raw_tag) in split_taglist(rest)?.into_iter().enumerate() {
                if raw_tag.is_empty() {
                    return Err(UrnError::EmptyTag(idx));
                }
                let (key, value) = parse_tag(&raw_tag)?;
                if tags.contains_key(&key) {
                    return Err(UrnError::DuplicateKey(key));
                }
                tags.insert(key, value);
            }
        }

        Ok(Self {
            scheme: scheme.to_owned(),
            tags,
        })
    }

    /// The URN's scheme (e.g. `"cap"`, `"media"`).
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Look up a tag's value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.tags.get(key)
    }

    /// `true` if `key` is present in `self` with a value matching `value`
    /// under exact literal equality (primarily useful for tests/queries,
    /// not for pattern matching — see [`Self::accepts`] for that).
    #[must_use]
    pub fn has(&self, key: &str, value: &str) -> bool {
        matches!(self.tags.get(key), Some(TagValue::Literal(v)) if v == value)
    }

    /// Iterate over all tags in canonical (ascending key) order.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Return a new URN with `key` set to `value`.
    #[must_use]
    pub fn with_tag(&self, key: &str, value: TagValue) -> Self {
        let mut tags = self.tags.clone();
        tags.insert(key.to_lowercase(), value);
        Self {
            scheme: self.scheme.clone(),
            tags,
        }
    }

    /// Return a new URN with `key` removed, if present.
    #[must_use]
    pub fn without_tag(&self, key: &str) -> Self {
        let mut tags = self.tags.clone();
        tags.remove(key);
        Self {
            scheme: self.scheme.clone(),
            tags,
        }
    }

    /// Treating `self` as a pattern, does it accept `instance`?
    ///
    /// Per tag in `self` (keys missing from `self` are implicitly
    /// accepted, regardless of `instance`):
    ///
    /// - `Wildcard` requires the key to be genuinely present in `instance`.
    /// - `Absent` requires the key to be genuinely absent from `instance`.
    /// - `DontCare` always matches.
    /// - `Literal(v)` requires `instance` to carry the identical literal `v`.
    #[must_use]
    pub fn accepts(&self, instance: &Self) -> bool {
        self.tags
            .iter()
            .all(|(key, pattern_value)| tag_matches(pattern_value, instance.tags.get(key)))
    }

    /// `self.conforms_to(pattern)` iff `pattern.accepts(self)`.
    #[must_use]
    pub fn conforms_to(&self, pattern: &Self) -> bool {
        pattern.accepts(self)
    }

    /// Sum of [`TagValue::grade`] over every tag present in `self`.
    #[must_use]
    pub fn specificity(&self) -> u32 {
        self.tags.values().map(TagValue::grade).sum()
    }

    /// `true` iff `self`'s specificity is strictly greater than `other`'s.
    #[must_use]
    pub fn is_more_specific_than(&self, other: &Self) -> bool {
        self.specificity() > other.specificity()
    }
}

pub(crate) fn tag_matches(pattern_value: &TagValue, instance_value: Option<&TagValue>) -> bool {
    match pattern_value {
        TagValue::DontCare => true,
        TagValue::Wildcard => instance_value.is_some_and(TagValue::is_present),
        TagValue::Absent => !instance_value.is_some_and(TagValue::is_present),
        TagValue::Literal(want) => {
            matches!(instance_value, Some(TagValue::Literal(got)) if got == want)
        }
    }
}

impl fmt::Display for TaggedUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        let mut first = true;
        for (key, value) in &self.tags {
            if !first {
                write!(f, ";")?;
            }
            first = false;
            match value {
                TagValue::Wildcard => write!(f, "{key}")?,
                other => write!(f, "{key}={other}")?,
            }
        }
        Ok(())
    }
}

impl Serialize for TaggedUrn {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TaggedUrn {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn validate_scheme(scheme: &str) -> Result<(), UrnError> {
    if scheme.is_empty() {
        return Err(UrnError::MissingScheme);
    }
    let mut chars = scheme.chars();
    let first = chars.next().expect("non-empty checked above");
    if !first.is_ascii_lowercase() {
        return Err(UrnError::InvalidFormat(scheme.to_owned()));
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(UrnError::InvalidFormat(scheme.to_owned()));
    }
    Ok(())
}

/// Split a taglist on unquoted `;` characters.
fn split_taglist(rest: &str) -> Result<Vec<String>, UrnError> {
    let mut tags = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if !in_quotes => {
                in_quotes = true;
                current.push(c);
            }
            '"' if in_quotes => {
                in_quotes = false;
                current.push(c);
            }
            '\\' if in_quotes => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                } else {
                    return Err(UrnError::UnterminatedQuote);
                }
            }
            ';' if !in_quotes => {
                tags.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(UrnError::UnterminatedQuote);
    }
    tags.push(current);
    Ok(tags)
}

/// Parse a single `key` or `key=value` tag.
fn parse_tag(raw: &str) -> Result<(String, TagValue), UrnError> {
    match raw.split_once('=') {
        None => {
            let key = validate_key(raw)?;
            Ok((key, TagValue::Wildcard))
        }
        Some((key_raw, value_raw)) => {
            let key = validate_key(key_raw)?;
            let value = parse_value(value_raw)?;
            Ok((key, value))
        }
    }
}

fn validate_key(raw: &str) -> Result<String, UrnError> {
    if raw.is_empty() {
        return Err(UrnError::InvalidTagFormat(raw.to_owned()));
    }
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(UrnError::NumericKey(raw.to_owned()));
    }
    let key = raw.to_lowercase();
    let mut chars = key.chars();
    let first = chars.next().expect("non-empty checked above");
    if !first.is_ascii_lowercase() {
        return Err(UrnError::InvalidTagFormat(raw.to_owned()));
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(UrnError::InvalidTagFormat(raw.to_owned()));
    }
    Ok(key)
}

fn parse_value(raw: &str) -> Result<TagValue, UrnError> {
    if raw == "*" {
        return Ok(TagValue::Wildcard);
    }
    if raw == "!" {
        return Ok(TagValue::Absent);
    }
    if raw == "?" {
        return Ok(TagValue::DontCare);
    }
    if let Some(inner) = raw.strip_prefix('"') {
        let inner = inner
            .strip_suffix('"')
            .ok_or(UrnError::UnterminatedQuote)?;
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some(e @ ('"' | '\\')) => out.push(e),
                    Some(other) => return Err(UrnError::InvalidEscapeSequence(other)),
                    None => return Err(UrnError::UnterminatedQuote),
                }
            } else {
                out.push(c);
            }
        }
        Ok(TagValue::Literal(out))
    } else {
        Ok(TagValue::Literal(raw.to_owned()))
    }
}
