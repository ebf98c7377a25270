// SPDX-License-Identifier: MIT OR Apache-2.0
//! The compiled-in built-in media spec table consulted by [`crate::resolve`]
//! when a caller-supplied `mediaSpecs` table has no entry for a given URN.

use std::collections::HashMap;

use crate::MediaSpecDefinition;

/// One compiled-in entry: the canonical URN text it resolves, its MIME
/// content type, and a schema "slug" used to build the profile URL under
/// `capns_config::schema_base_url()`.
struct Entry {
    urn: &'static str,
    content_type: &'static str,
    slug: &'static str,
    extensions: &'static [&'static str],
}

const ENTRIES: &[Entry] = &[
    Entry { urn: "media:pdf", content_type: "application/pdf", slug: "pdf", extensions: &["pdf"] },
    Entry { urn: "media:plain;textable", content_type: "text/plain", slug: "plain-text", extensions: &["txt"] },
    Entry { urn: "media:markdown;textable", content_type: "text/markdown", slug: "markdown", extensions: &["md", "markdown"] },
    Entry { urn: "media:html;textable", content_type: "text/html", slug: "html", extensions: &["html", "htm"] },
    Entry { urn: "media:csv;textable;list", content_type: "text/csv", slug: "csv", extensions: &["csv"] },
    Entry { urn: "media:json;record;textable", content_type: "application/json", slug: "json-record", extensions: &["json"] },
    Entry { urn: "media:json;list;textable", content_type: "application/json", slug: "json-list", extensions: &["json"] },
    Entry { urn: "media:yaml;record;textable", content_type: "application/yaml", slug: "yaml", extensions: &["yaml", "yml"] },
    Entry { urn: "media:xml;textable", content_type: "application/xml", slug: "xml", extensions: &["xml"] },
    Entry { urn: "media:toml;record;textable", content_type: "application/toml", slug: "toml", extensions: &["toml"] },
    Entry { urn: "media:image;png", content_type: "image/png", slug: "image-png", extensions: &["png"] },
    Entry { urn: "media:image;jpeg", content_type: "image/jpeg", slug: "image-jpeg", extensions: &["jpg", "jpeg"] },
    Entry { urn: "media:image;gif", content_type: "image/gif", slug: "image-gif", extensions: &["gif"] },
    Entry { urn: "media:image;webp", content_type: "image/webp", slug: "image-webp", extensions: &["webp"] },
    Entry { urn: "media:image;svg;textable", content_type: "image/svg+xml", slug: "image-svg", extensions: &["svg"] },
    Entry { urn: "media:image;bmp", content_type: "image/bmp", slug: "image-bmp", extensions: &["bmp"] },
    Entry { urn: "media:image;tiff", content_type: "image/tiff", slug: "image-tiff", extensions: &["tif", "tiff"] },
    Entry { urn: "media:image;heic", content_type: "image/heic", slug: "image-heic", extensions: &["heic"] },
    Entry { urn: "media:image;avif", content_type: "image/avif", slug: "image-avif", extensions: &["avif"] },
    Entry { urn: "media:image;icon", content_type: "image/x-icon", slug: "image-icon", extensions: &["ico"] },
    Entry { urn: "media:audio;mp3", content_type: "audio/mpeg", slug: "audio-mp3", extensions: &["mp3"] },
    Entry { urn: "media:audio;wav", content_type: "audio/wav", slug: "audio-wav", extensions: &["wav"] },
    Entry { urn: "media:audio;ogg", content_type: "audio/ogg", slug: "audio-ogg", extensions: &["ogg"] },
    Entry { urn: "media:audio;flac", content_type: "audio/flac", slug: "audio-flac", extensions: &["flac"] },
    Entry { urn: "media:audio;aac", content_type: "audio/aac", slug: "audio-aac", extensions: &["aac"] },
    Entry { urn: "media:video;mp4", content_type: "video/mp4", slug: "video-mp4", extensions: &["mp4"] },
    Entry { urn: "media:video;webm", content_type: "video/webm", slug: "video-webm", extensions: &["webm"] },
    Entry { urn: "media:video;quicktime", content_type: "video/quicktime", slug: "video-quicktime", extensions: &["mov"] },
    Entry { urn: "media:video;avi", content_type: "video/x-msvideo", slug: "video-avi", extensions: &["avi"] },
    Entry { urn: "media:video;matroska", content_type: "video/x-matroska", slug: "video-matroska", extensions: &["mkv"] },
    Entry { urn: "media:docx", content_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document", slug: "docx", extensions: &["docx"] },
    Entry { urn: "media:xlsx;list", content_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", slug: "xlsx", extensions: &["xlsx"] },
    Entry { urn: "media:pptx;list", content_type: "application/vnd.openxmlformats-officedocument.presentationml.presentation", slug: "pptx", extensions: &["pptx"] },
    Entry { urn: "media:odt", content_type: "application/vnd.oasis.opendocument.text", slug: "odt", extensions: &["odt"] },
    Entry { urn: "media:rtf;textable", content_type: "application/rtf", slug: "rtf", extensions: &["rtf"] },
    Entry { urn: "media:epub", content_type: "application/epub+zip", slug: "epub", extensions: &["epub"] },
    Entry { urn: "media:zip", content_type: "application/zip", slug: "zip", extensions: &["zip"] },
    Entry { urn: "media:tar", content_type: "application/x-tar", slug: "tar", extensions: &["tar"] },
    Entry { urn: "media:gzip", content_type: "application/gzip", slug: "gzip", extensions: &["gz"] },
    Entry { urn: "media:zstd", content_type: "application/zstd", slug: "zstd", extensions: &["zst"] },
    Entry { urn: "media:bytes", content_type: "application/octet-stream", slug: "bytes", extensions: &[] },
    Entry { urn: "media:numeric;textable", content_type: "text/plain", slug: "numeric", extensions: &[] },
    Entry { urn: "media:bool;textable", content_type: "text/plain", slug: "bool", extensions: &[] },
    Entry { urn: "media:void", content_type: "application/x-void", slug: "void", extensions: &[] },
    Entry { urn: "media:file-path;textable", content_type: "text/plain", slug: "file-path", extensions: &[] },
    Entry { urn: "media:collection;list", content_type: "application/x-capns-collection", slug: "collection", extensions: &[] },
    Entry { urn: "media:embedding-vector;list", content_type: "application/x-embedding-vector", slug: "embedding-vector", extensions: &[] },
];

pub(crate) fn build() -> HashMap<&'static str, MediaSpecDefinition> {
    ENTRIES
        .iter()
        .map(|entry| {
            let base = crate::schema_profile_url(entry.slug);
            let definition = MediaSpecDefinition {
                content_type: entry.content_type.to_owned(),
                profile: Some(base),
                schema: None,
                title: None,
                description: None,
                validation: None,
                file_extensions: entry.extensions.iter().map(|s| (*s).to_owned()).collect(),
            };
            (entry.urn, definition)
        })
        .collect()
}
