// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pure tag-predicate helpers that read only a [`MediaUrn`]'s marker tags.
//!
//! None of these resolve anything — they never consult the built-in table
//! or a caller-supplied `mediaSpecs` table, so they are infallible and
//! cheap to call on every URN encountered during planning.

use capns_urn::MediaUrn;

/// `true` if `urn` carries the `textable` marker tag.
#[must_use]
pub fn is_text(urn: &MediaUrn) -> bool {
    urn.has_tag("textable")
}

/// `true` if `urn` does not carry the `textable` marker — the wire default
/// for any media URN without an explicit textable marker is opaque bytes.
#[must_use]
pub fn is_binary(urn: &MediaUrn) -> bool {
    !is_text(urn)
}

/// `true` if `urn` carries the `list` marker, promoting it from the
/// default opaque-scalar structure to a sequence.
#[must_use]
pub fn is_list(urn: &MediaUrn) -> bool {
    urn.has_tag("list")
}

/// `true` if `urn` carries the `record` marker, promoting it to a keyed
/// structure.
#[must_use]
pub fn is_record(urn: &MediaUrn) -> bool {
    urn.has_tag("record")
}

/// `true` iff `urn` is not a list — the default cardinality.
#[must_use]
pub fn is_scalar(urn: &MediaUrn) -> bool {
    !is_list(urn)
}

/// `true` iff `urn` is not a record — the default structure.
#[must_use]
pub fn is_opaque(urn: &MediaUrn) -> bool {
    !is_record(urn)
}

/// `true` if `urn` carries the `image` marker.
#[must_use]
pub fn is_image(urn: &MediaUrn) -> bool {
    urn.has_tag("image")
}

/// `true` if `urn` carries the `audio` marker.
#[must_use]
pub fn is_audio(urn: &MediaUrn) -> bool {
    urn.has_tag("audio")
}

/// `true` if `urn` carries the `video` marker.
#[must_use]
pub fn is_video(urn: &MediaUrn) -> bool {
    urn.has_tag("video")
}

/// `true` if `urn` carries the `json` marker.
#[must_use]
pub fn is_json(urn: &MediaUrn) -> bool {
    urn.has_tag("json")
}

/// `true` if `urn` carries the `numeric` marker.
#[must_use]
pub fn is_numeric(urn: &MediaUrn) -> bool {
    urn.has_tag("numeric")
}

/// `true` if `urn` carries the `bool` marker.
#[must_use]
pub fn is_bool(urn: &MediaUrn) -> bool {
    urn.has_tag("bool")
}

/// `true` if `urn` carries the `void` marker (no content at all).
#[must_use]
pub fn is_void(urn: &MediaUrn) -> bool {
    urn.has_tag("void")
}

/// `true` if `urn` carries the `file-path` marker.
#[must_use]
pub fn is_file_path(urn: &MediaUrn) -> bool {
    urn.has_tag("file-path")
}

/// `true` if `urn` carries the `collection` marker.
#[must_use]
pub fn is_collection(urn: &MediaUrn) -> bool {
    urn.has_tag("collection")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_structure_is_opaque_scalar() {
        let urn = MediaUrn::parse("media:pdf").unwrap();
        assert!(is_scalar(&urn));
        assert!(is_opaque(&urn));
        assert!(is_binary(&urn));
    }

    #[test]
    fn list_marker_promotes_to_sequence() {
        let urn = MediaUrn::parse("media:json;list").unwrap();
        assert!(is_list(&urn));
        assert!(!is_scalar(&urn));
    }

    #[test]
    fn record_marker_promotes_to_keyed() {
        let urn = MediaUrn::parse("media:json;record").unwrap();
        assert!(is_record(&urn));
        assert!(!is_opaque(&urn));
    }

    #[test]
    fn textable_marker_flips_binary() {
        let urn = MediaUrn::parse("media:plain;textable").unwrap();
        assert!(is_text(&urn));
        assert!(!is_binary(&urn));
    }

    #[test]
    fn media_kind_markers() {
        assert!(is_image(&MediaUrn::parse("media:image;png").unwrap()));
        assert!(is_audio(&MediaUrn::parse("media:audio;mp3").unwrap()));
        assert!(is_video(&MediaUrn::parse("media:video;mp4").unwrap()));
        assert!(is_void(&MediaUrn::parse("media:void").unwrap()));
    }
}
