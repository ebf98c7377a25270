// SPDX-License-Identifier: MIT OR Apache-2.0
//! On-disk cache for registry responses.
//!
//! The registry HTTP service itself is out of scope for capns (see
//! spec §1's "deliberately out of scope" list), but the cache *file
//! format* is part of the interface the core consumes from that external
//! collaborator, so we implement read/write/expire here.
//!
//! Cache keys are `SHA-256(canonical-urn-text)` hex, per spec §6. Callers
//! MUST pass already-canonicalized URN text (or parseable URN text — see
//! [`cache_key`]) since two spellings of the same URN must hash identically
//! (spec §9 open question 4).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use capns_urn::{TaggedUrn, UrnError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while reading or writing the registry cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// `urn_text` could not be parsed, so it could not be canonicalized
    /// before hashing.
    #[error("cannot hash un-parseable urn: {0}")]
    InvalidUrn(#[from] UrnError),
    /// Underlying filesystem I/O failure.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The cached file was not valid JSON, or didn't match [`CacheEntry`]'s
    /// shape.
    #[error("corrupt cache entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// One on-disk cache entry: `{ definition, cached_at, ttl_hours }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached registry response payload, opaque to this crate.
    pub definition: serde_json::Value,
    /// When this entry was written.
    pub cached_at: DateTime<Utc>,
    /// How long the entry remains valid, in hours, from `cached_at`.
    pub ttl_hours: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::hours(self.ttl_hours as i64);
        now >= self.cached_at + ttl
    }
}

/// Canonicalize `urn_text` (parsing it as a generic [`TaggedUrn`] — this
/// works for both `cap:` and `media:` schemes) and return the hex SHA-256
/// digest of its canonical form.
///
/// # Errors
///
/// Returns [`CacheError::InvalidUrn`] if `urn_text` does not parse.
pub fn cache_key(urn_text: &str) -> Result<String, CacheError> {
    let canonical = TaggedUrn::parse(urn_text)?.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// A directory-backed cache of registry responses, keyed by
/// `SHA-256(canonical-urn-text)`.
#[derive(Debug, Clone)]
pub struct RegistryCache {
    dir: PathBuf,
}

impl RegistryCache {
    /// Point a cache at `dir`. The directory is not created until the
    /// first [`Self::put`].
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Look up `urn_text`'s cached entry.
    ///
    /// Returns `Ok(None)` if there is no entry, or if the entry has expired
    /// (an expired entry is removed from disk as a side effect). Returns
    /// `Ok(Some(value))` with the cached `definition` payload otherwise.
    ///
    /// # Errors
    ///
    /// Propagates [`CacheError::InvalidUrn`], filesystem errors other than
    /// "not found", and [`CacheError::Corrupt`] for a malformed entry file.
    pub fn get(&self, urn_text: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let key = cache_key(urn_text)?;
        let path = self.entry_path(&key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: CacheEntry = serde_json::from_str(&raw)?;
        if entry.is_expired(now()) {
            let _ = fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(entry.definition))
    }

    /// Write `definition` as `urn_text`'s cached entry with the given TTL,
    /// stamped with the current time. Creates the cache directory if
    /// necessary.
    ///
    /// # Errors
    ///
    /// Propagates [`CacheError::InvalidUrn`] and filesystem errors.
    pub fn put(
        &self,
        urn_text: &str,
        definition: serde_json::Value,
        ttl_hours: u64,
    ) -> Result<(), CacheError> {
        let key = cache_key(urn_text)?;
        fs::create_dir_all(&self.dir)?;
        let entry = CacheEntry {
            definition,
            cached_at: now(),
            ttl_hours,
        };
        let serialized = serde_json::to_string_pretty(&entry)?;
        fs::write(self.entry_path(&key), serialized)?;
        Ok(())
    }

    /// Remove `urn_text`'s cached entry, if any. Not an error if absent.
    ///
    /// # Errors
    ///
    /// Propagates [`CacheError::InvalidUrn`] and filesystem errors other
    /// than "not found".
    pub fn invalidate(&self, urn_text: &str) -> Result<(), CacheError> {
        let key = cache_key(urn_text)?;
        match fs::remove_file(self.entry_path(&key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// The directory this cache reads and writes.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn now() -> DateTime<Utc> {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    DateTime::<Utc>::from_timestamp(since_epoch.as_secs() as i64, since_epoch.subsec_nanos())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn different_spellings_of_same_urn_hash_identically() {
        let a = cache_key("media:png;image").unwrap();
        let b = cache_key("media:image;png").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unparseable_urn_errors() {
        assert!(cache_key("not-a-urn-at-all").is_err());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RegistryCache::new(dir.path());
        assert!(cache.get("media:pdf").unwrap().is_none());

        cache
            .put("media:pdf", json!({"content_type": "application/pdf"}), 24)
            .unwrap();
        let got = cache.get("media:pdf").unwrap().unwrap();
        assert_eq!(got["content_type"], "application/pdf");
    }

    #[test]
    fn expired_entry_is_removed_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RegistryCache::new(dir.path());
        let key = cache_key("media:pdf").unwrap();
        let path = dir.path().join(format!("{key}.json"));
        let stale = CacheEntry {
            definition: json!({"content_type": "application/pdf"}),
            cached_at: Utc::now() - chrono::Duration::hours(100),
            ttl_hours: 1,
        };
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        assert!(cache.get("media:pdf").unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn invalidate_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RegistryCache::new(dir.path());
        cache.put("media:pdf", json!({"a": 1}), 24).unwrap();
        cache.invalidate("media:pdf").unwrap();
        assert!(cache.get("media:pdf").unwrap().is_none());
    }
}
