// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-media
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Resolves [`MediaUrn`]s to concrete wire descriptors ([`MediaSpec`]), and
//! exposes pure tag-predicate helpers (`is_list`, `is_textable`, …) that
//! read only the URN's marker tags.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use capns_urn::MediaUrn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod builtins;
mod predicates;

pub use predicates::*;

/// Errors raised while resolving a media URN to a [`MediaSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// Neither the caller-supplied table nor the built-ins had an entry.
    #[error("unresolvable media urn: {0}")]
    UnresolvableMediaUrn(String),
    /// An inline table entry shadows a built-in URN.
    #[error("inline media spec redefines registry entry: {0}")]
    InlineMediaSpecRedefinesRegistry(String),
    /// The same canonical URN appeared twice in the caller-supplied table.
    #[error("duplicate media urn in table: {0}")]
    DuplicateMediaUrn(String),
}

/// A resolved media descriptor, suitable for wire transmission or local
/// validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSpec {
    /// MIME content type, e.g. `"application/pdf"`.
    pub content_type: String,
    /// Optional JSON-Schema or other profile URL.
    pub profile: Option<String>,
    /// Optional inline JSON schema.
    pub schema: Option<serde_json::Value>,
    /// Optional human title.
    pub title: Option<String>,
    /// Optional human description.
    pub description: Option<String>,
    /// Optional free-form validation rules (interpreted by callers).
    pub validation: Option<serde_json::Value>,
    /// File extension hints, without the leading dot.
    pub file_extensions: Vec<String>,
    /// Predicate flags copied from the source URN at resolution time.
    pub predicates: PredicateFlags,
}

/// The predicate flags computed from a [`MediaUrn`]'s marker tags, snapshot
/// onto a resolved [`MediaSpec`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateFlags {
    /// See [`is_text`].
    pub text: bool,
    /// See [`is_list`].
    pub list: bool,
    /// See [`is_record`].
    pub record: bool,
    /// See [`is_image`].
    pub image: bool,
    /// See [`is_audio`].
    pub audio: bool,
    /// See [`is_video`].
    pub video: bool,
    /// See [`is_json`].
    pub json: bool,
    /// See [`is_numeric`].
    pub numeric: bool,
    /// See [`is_bool`].
    pub boolean: bool,
    /// See [`is_void`].
    pub void: bool,
    /// See [`is_file_path`].
    pub file_path: bool,
    /// See [`is_collection`].
    pub collection: bool,
}

impl PredicateFlags {
    fn of(urn: &MediaUrn) -> Self {
        Self {
            text: predicates::is_text(urn),
            list: predicates::is_list(urn),
            record: predicates::is_record(urn),
            image: predicates::is_image(urn),
            audio: predicates::is_audio(urn),
            video: predicates::is_video(urn),
            json: predicates::is_json(urn),
            numeric: predicates::is_numeric(urn),
            boolean: predicates::is_bool(urn),
            void: predicates::is_void(urn),
            file_path: predicates::is_file_path(urn),
            collection: predicates::is_collection(urn),
        }
    }
}

/// An entry in a caller-supplied media-specs table: an explicit URN paired
/// with its resolved definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSpecEntry {
    /// The URN this entry resolves.
    pub urn: MediaUrn,
    /// The resolved descriptor, minus the URN-derived `predicates` field
    /// (filled in at resolution time from `urn`).
    pub definition: MediaSpecDefinition,
}

/// The caller-authored part of a [`MediaSpecEntry`] — everything except
/// the predicate flags, which are always derived from the URN itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSpecDefinition {
    /// See [`MediaSpec::content_type`].
    pub content_type: String,
    /// See [`MediaSpec::profile`].
    #[serde(default)]
    pub profile: Option<String>,
    /// See [`MediaSpec::schema`].
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
    /// See [`MediaSpec::title`].
    #[serde(default)]
    pub title: Option<String>,
    /// See [`MediaSpec::description`].
    #[serde(default)]
    pub description: Option<String>,
    /// See [`MediaSpec::validation`].
    #[serde(default)]
    pub validation: Option<serde_json::Value>,
    /// See [`MediaSpec::file_extensions`].
    #[serde(default)]
    pub file_extensions: Vec<String>,
}

impl MediaSpecDefinition {
    fn into_spec(self, urn: &MediaUrn) -> MediaSpec {
        MediaSpec {
            content_type: self.content_type,
            profile: self.profile,
            schema: self.schema,
            title: self.title,
            description: self.description,
            validation: self.validation,
            file_extensions: self.file_extensions,
            predicates: PredicateFlags::of(urn),
        }
    }
}

/// Resolve `urn` to a [`MediaSpec`], preferring `table` over the built-ins.
///
/// # Errors
///
/// - [`MediaError::DuplicateMediaUrn`] / [`MediaError::InlineMediaSpecRedefinesRegistry`]
///   if `table` is malformed.
/// - [`MediaError::UnresolvableMediaUrn`] if neither `table` nor the
///   built-ins have an entry for `urn`'s canonical text.
pub fn resolve(urn: &MediaUrn, table: &[MediaSpecEntry]) -> Result<MediaSpec, MediaError> {
    validate_table(table)?;
    let canonical = urn.to_string();
    if let Some(entry) = table.iter().find(|e| e.urn.to_string() == canonical) {
        return Ok(entry.definition.clone().into_spec(urn));
    }
    builtin_table()
        .get(canonical.as_str())
        .cloned()
        .map(|def| def.into_spec(urn))
        .ok_or(MediaError::UnresolvableMediaUrn(canonical))
}

fn validate_table(table: &[MediaSpecEntry]) -> Result<(), MediaError> {
    let mut seen = HashSet::with_capacity(table.len());
    for entry in table {
        let canonical = entry.urn.to_string();
        if !seen.insert(canonical.clone()) {
            return Err(MediaError::DuplicateMediaUrn(canonical));
        }
        if builtin_table().contains_key(canonical.as_str()) {
            return Err(MediaError::InlineMediaSpecRedefinesRegistry(canonical));
        }
    }
    Ok(())
}

fn builtin_table() -> &'static HashMap<&'static str, MediaSpecDefinition> {
    static TABLE: OnceLock<HashMap<&'static str, MediaSpecDefinition>> = OnceLock::new();
    TABLE.get_or_init(builtins::build)
}

/// Build a built-in media spec's profile URL from its schema slug, rooted
/// at `capns_config::schema_base_url()` (`CAPNS_SCHEMA_BASE_URL` /
/// `CAPNS_REGISTRY_URL`, default `https://capns.org/schema`).
pub(crate) fn schema_profile_url(slug: &str) -> String {
    format!("{}/{slug}", capns_config::schema_base_url())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_a_builtin() {
        let urn = MediaUrn::parse("media:pdf").unwrap();
        let spec = resolve(&urn, &[]).unwrap();
        assert_eq!(spec.content_type, "application/pdf");
        assert!(!spec.predicates.text);
    }

    #[test]
    fn resolves_json_record_textable_builtin() {
        let urn = MediaUrn::parse("media:json;record;textable").unwrap();
        let spec = resolve(&urn, &[]).unwrap();
        assert_eq!(spec.content_type, "application/json");
        assert!(spec.predicates.text);
        assert!(spec.predicates.json);
    }

    #[test]
    fn unresolvable_urn_errors() {
        let urn = MediaUrn::parse("media:nonexistent-format-xyz").unwrap();
        let err = resolve(&urn, &[]).unwrap_err();
        assert_eq!(
            err,
            MediaError::UnresolvableMediaUrn("media:nonexistent-format-xyz".to_owned())
        );
    }

    #[test]
    fn inline_entry_overrides_when_not_a_builtin() {
        let urn = MediaUrn::parse("media:widget;custom").unwrap();
        let table = vec![MediaSpecEntry {
            urn: urn.clone(),
            definition: MediaSpecDefinition {
                content_type: "application/x-widget".to_owned(),
                profile: None,
                schema: None,
                title: Some("Widget".to_owned()),
                description: None,
                validation: None,
                file_extensions: vec!["widget".to_owned()],
            },
        }];
        let spec = resolve(&urn, &table).unwrap();
        assert_eq!(spec.content_type, "application/x-widget");
    }

    #[test]
    fn inline_entry_shadowing_builtin_errors() {
        let urn = MediaUrn::parse("media:pdf").unwrap();
        let table = vec![MediaSpecEntry {
            urn: urn.clone(),
            definition: MediaSpecDefinition {
                content_type: "application/x-not-pdf".to_owned(),
                profile: None,
                schema: None,
                title: None,
                description: None,
                validation: None,
                file_extensions: vec![],
            },
        }];
        let err = resolve(&urn, &table).unwrap_err();
        assert_eq!(
            err,
            MediaError::InlineMediaSpecRedefinesRegistry("media:pdf".to_owned())
        );
    }

    #[test]
    fn duplicate_inline_urn_errors() {
        let urn = MediaUrn::parse("media:widget;custom").unwrap();
        let def = MediaSpecDefinition {
            content_type: "application/x-widget".to_owned(),
            profile: None,
            schema: None,
            title: None,
            description: None,
            validation: None,
            file_extensions: vec![],
        };
        let table = vec![
            MediaSpecEntry {
                urn: urn.clone(),
                definition: def.clone(),
            },
            MediaSpecEntry {
                urn: urn.clone(),
                definition: def,
            },
        ];
        let err = resolve(&urn, &table).unwrap_err();
        assert_eq!(
            err,
            MediaError::DuplicateMediaUrn("media:widget;custom".to_owned())
        );
    }
}
