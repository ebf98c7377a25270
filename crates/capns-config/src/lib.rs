// SPDX-License-Identifier: MIT OR Apache-2.0
//! capns-config
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Process-wide environment configuration and the on-disk registry response
//! cache. `capns-config` intentionally holds no shared mutable global state:
//! [`schema_base_url`] is a pure function that re-reads the environment on
//! every call and returns a freshly cloned `String`.

pub mod cache;

use std::env;

/// Environment variable that, when set, overrides the schema profile base
/// URL used for built-in media specs.
pub const SCHEMA_BASE_URL_VAR: &str = "CAPNS_SCHEMA_BASE_URL";

/// Environment variable naming an alternative registry URL; when set (and
/// `CAPNS_SCHEMA_BASE_URL` is not), the schema base URL is `{URL}/schema`.
pub const REGISTRY_URL_VAR: &str = "CAPNS_REGISTRY_URL";

/// Default schema base URL when neither environment variable is set.
pub const DEFAULT_SCHEMA_BASE_URL: &str = "https://capns.org/schema";

/// Resolve the schema profile base URL.
///
/// Precedence: `CAPNS_SCHEMA_BASE_URL` (used verbatim), then
/// `CAPNS_REGISTRY_URL` (with `/schema` appended), then
/// [`DEFAULT_SCHEMA_BASE_URL`]. Reads the environment fresh on every call;
/// callers that need a stable value for the duration of a run should read
/// it once and hold onto the returned `String` themselves.
#[must_use]
pub fn schema_base_url() -> String {
    if let Ok(explicit) = env::var(SCHEMA_BASE_URL_VAR) {
        return explicit;
    }
    if let Ok(registry) = env::var(REGISTRY_URL_VAR) {
        return format!("{}/schema", registry.trim_end_matches('/'));
    }
    DEFAULT_SCHEMA_BASE_URL.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize the tests that
    // touch them so they don't observe each other's writes.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        unsafe {
            env::remove_var(SCHEMA_BASE_URL_VAR);
            env::remove_var(REGISTRY_URL_VAR);
        }
    }

    #[test]
    fn defaults_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        assert_eq!(schema_base_url(), DEFAULT_SCHEMA_BASE_URL);
    }

    #[test]
    fn explicit_schema_base_url_wins() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var(SCHEMA_BASE_URL_VAR, "https://example.test/schema");
            env::set_var(REGISTRY_URL_VAR, "https://other.test");
        }
        assert_eq!(schema_base_url(), "https://example.test/schema");
        clear_env();
    }

    #[test]
    fn registry_url_appends_schema_segment() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var(REGISTRY_URL_VAR, "https://registry.test/");
        }
        assert_eq!(schema_base_url(), "https://registry.test/schema");
        clear_env();
    }
}
