// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cap definitions and manifests: the data a plugin publishes about what it
//! can do.

use capns_media::MediaSpecEntry;
use capns_urn::{CapUrn, MediaUrn};
use serde::{Deserialize, Serialize};

/// Where an [`Arg`]'s value comes from on invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Read from standard input, tagged with the given media type.
    Stdin(MediaUrn),
    /// A positional CLI argument, 0-indexed.
    Position(u32),
    /// A named CLI flag, e.g. `"--input"`.
    CliFlag(String),
}

/// One declared argument of a [`Cap`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arg {
    /// The media type this argument accepts.
    pub media_urn: MediaUrn,
    /// Whether the argument must be supplied.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Ordered list of places this argument's value can come from.
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional default value, used when the argument is not required and
    /// not supplied.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    /// Optional free-form metadata.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

fn default_required() -> bool {
    true
}

/// The declared output of a [`Cap`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    /// The media type this cap produces.
    pub media_urn: MediaUrn,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional free-form metadata.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// A capability definition: a typed, media-tagged function a plugin
/// exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cap {
    /// The cap's structured identifier (`cap:in=…;out=…;…`).
    pub urn: CapUrn,
    /// Human-readable title.
    pub title: String,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Command string, interpreted by the plugin (CLI subcommand name).
    pub command: String,
    /// Ordered argument declarations.
    #[serde(default)]
    pub args: Vec<Arg>,
    /// Declared output, if any.
    #[serde(default)]
    pub output: Option<Output>,
    /// Per-cap media spec table, consulted before the compiled-in built-ins
    /// when resolving this cap's argument/output media types.
    #[serde(default)]
    pub media_specs: Vec<MediaSpecEntry>,
}

impl Cap {
    /// Build the mandatory identity cap: `cap:in=media:;out=media:`.
    ///
    /// Its unconstrained `in`/`out` fields act as patterns that accept any
    /// media type — the categorical identity morphism of the media graph.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            urn: CapUrn::parse("cap:in=media:;out=media:").expect("identity urn is valid"),
            title: "Identity".to_owned(),
            description: Some("Passes its input through unchanged.".to_owned()),
            command: "identity".to_owned(),
            args: vec![Arg {
                media_urn: MediaUrn::parse("media:").expect("valid"),
                required: true,
                sources: vec![Source::Stdin(MediaUrn::parse("media:").expect("valid"))],
                description: None,
                default: None,
                metadata: None,
            }],
            output: Some(Output {
                media_urn: MediaUrn::parse("media:").expect("valid"),
                description: None,
                metadata: None,
            }),
            media_specs: Vec::new(),
        }
    }

    /// Build the optional discard cap: `cap:in=media:;out=media:void`.
    #[must_use]
    pub fn discard() -> Self {
        Self {
            urn: CapUrn::parse("cap:in=media:;out=media:void").expect("discard urn is valid"),
            title: "Discard".to_owned(),
            description: Some("Reads and drops all input, producing nothing.".to_owned()),
            command: "discard".to_owned(),
            args: vec![Arg {
                media_urn: MediaUrn::parse("media:").expect("valid"),
                required: true,
                sources: vec![Source::Stdin(MediaUrn::parse("media:").expect("valid"))],
                description: None,
                default: None,
                metadata: None,
            }],
            output: Some(Output {
                media_urn: MediaUrn::parse("media:void").expect("valid"),
                description: None,
                metadata: None,
            }),
            media_specs: Vec::new(),
        }
    }

    /// `true` if this cap's URN matches the mandatory identity pattern
    /// `cap:in=media:;out=media:`.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        identity_pattern().accepts(&self.urn)
    }
}

fn identity_pattern() -> CapUrn {
    CapUrn::parse("cap:in=media:;out=media:").expect("identity pattern is valid")
}

/// A named, versioned bundle of [`Cap`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Plugin name.
    pub name: String,
    /// Plugin version string.
    pub version: String,
    /// Human-readable description.
    pub description: String,
    /// Optional author.
    #[serde(default)]
    pub author: Option<String>,
    /// Optional homepage URL.
    #[serde(default, rename = "page_url")]
    pub page_url: Option<String>,
    /// The caps this plugin exposes.
    pub caps: Vec<Cap>,
}

/// A manifest failed its structural invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// No cap in the manifest matches the mandatory identity pattern.
    #[error("manifest is missing the mandatory identity cap (cap:in=media:;out=media:)")]
    MissingIdentity,
}

impl Manifest {
    /// `true` iff at least one cap matches the mandatory identity pattern.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.caps.iter().any(Cap::is_identity)
    }

    /// Reject a manifest lacking the mandatory identity cap.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::MissingIdentity`] if no cap matches
    /// `cap:in=media:;out=media:`.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.has_identity() {
            Ok(())
        } else {
            Err(ManifestError::MissingIdentity)
        }
    }

    /// Non-destructively add the standard identity cap if this manifest
    /// doesn't already have one.
    #[must_use]
    pub fn ensure_identity(mut self) -> Self {
        if !self.has_identity() {
            self.caps.push(Cap::identity());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cap(urn: &str) -> Cap {
        Cap {
            urn: CapUrn::parse(urn).unwrap(),
            title: "Sample".into(),
            description: None,
            command: "sample".into(),
            args: vec![],
            output: None,
            media_specs: vec![],
        }
    }

    #[test]
    fn manifest_without_identity_fails_validation() {
        let m = Manifest {
            name: "n".into(),
            version: "0.1.0".into(),
            description: "d".into(),
            author: None,
            page_url: None,
            caps: vec![sample_cap("cap:in=media:pdf;out=\"media:image;png\"")],
        };
        assert_eq!(m.validate().unwrap_err(), ManifestError::MissingIdentity);
    }

    #[test]
    fn ensure_identity_adds_non_destructively() {
        let m = Manifest {
            name: "n".into(),
            version: "0.1.0".into(),
            description: "d".into(),
            author: None,
            page_url: None,
            caps: vec![sample_cap("cap:in=media:pdf;out=\"media:image;png\"")],
        };
        let fixed = m.ensure_identity();
        assert!(fixed.validate().is_ok());
        assert_eq!(fixed.caps.len(), 2);
    }

    #[test]
    fn ensure_identity_is_idempotent() {
        let m = Manifest {
            name: "n".into(),
            version: "0.1.0".into(),
            description: "d".into(),
            author: None,
            page_url: None,
            caps: vec![Cap::identity()],
        };
        let fixed = m.ensure_identity();
        assert_eq!(fixed.caps.len(), 1);
    }

    #[test]
    fn identity_matches_own_pattern() {
        assert!(Cap::identity().is_identity());
    }

    #[test]
    fn discard_does_not_match_identity_pattern() {
        assert!(!Cap::discard().is_identity());
    }
}
