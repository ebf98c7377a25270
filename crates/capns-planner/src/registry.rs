// SPDX-License-Identifier: MIT OR Apache-2.0
//! Read-only registry views the [`crate::PlanBuilder`] consults: which caps
//! exist, and how a media URN resolves to its wire descriptor.
//!
//! Both are traits rather than concrete catalogs so a planner can be pointed
//! at a remote schema registry (out of scope here, see spec §1's
//! "deliberately out of scope" list) without changing planning logic —
//! [`CatalogCapRegistry`]/[`MediaSpecTableRegistry`] are the local,
//! in-process implementations used by tests and single-process deployments.

use std::sync::Arc;

use async_trait::async_trait;
use capns_catalog::{Cap, CapCatalog};
use capns_media::{MediaSpec, MediaSpecEntry};
use capns_urn::{CapUrn, MediaUrn};

use crate::PlannerError;

/// A read-only view over a set of registered caps.
#[async_trait]
pub trait CapRegistry: Send + Sync {
    /// Every registered cap, in registration order.
    async fn all(&self) -> Result<Vec<Cap>, PlannerError>;

    /// Caps whose URN is accepted by `request` (see
    /// [`capns_catalog::CapCatalog::lookup`]), specificity-descending.
    async fn lookup(&self, request: &CapUrn) -> Result<Vec<Cap>, PlannerError>;
}

/// A read-only view over media-spec resolution.
#[async_trait]
pub trait MediaUrnRegistry: Send + Sync {
    /// Resolve `urn` to its wire descriptor.
    async fn resolve(&self, urn: &MediaUrn) -> Result<MediaSpec, PlannerError>;
}

/// [`CapRegistry`] backed directly by an in-process [`CapCatalog`].
#[derive(Debug, Clone)]
pub struct CatalogCapRegistry {
    catalog: Arc<CapCatalog>,
}

impl CatalogCapRegistry {
    /// Wrap `catalog` for planning.
    #[must_use]
    pub fn new(catalog: Arc<CapCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl CapRegistry for CatalogCapRegistry {
    async fn all(&self) -> Result<Vec<Cap>, PlannerError> {
        Ok(self.catalog.iter().map(|entry| entry.cap.clone()).collect())
    }

    async fn lookup(&self, request: &CapUrn) -> Result<Vec<Cap>, PlannerError> {
        Ok(self.catalog.lookup(request).into_iter().cloned().collect())
    }
}

/// [`MediaUrnRegistry`] backed by a caller-supplied media-specs table,
/// falling back to [`capns_media`]'s compiled-in built-ins.
#[derive(Debug, Clone, Default)]
pub struct MediaSpecTableRegistry {
    table: Vec<MediaSpecEntry>,
}

impl MediaSpecTableRegistry {
    /// Build a registry consulting `table` before the built-ins.
    #[must_use]
    pub fn new(table: Vec<MediaSpecEntry>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl MediaUrnRegistry for MediaSpecTableRegistry {
    async fn resolve(&self, urn: &MediaUrn) -> Result<MediaSpec, PlannerError> {
        capns_media::resolve(urn, &self.table).map_err(|err| match err {
            capns_media::MediaError::UnresolvableMediaUrn(u) => PlannerError::NotFound(u),
            other => PlannerError::RegistryError(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capns_urn::CapUrn;

    fn cap(urn: &str) -> Cap {
        Cap {
            urn: CapUrn::parse(urn).unwrap(),
            title: urn.to_owned(),
            description: None,
            command: "c".into(),
            args: vec![],
            output: None,
            media_specs: vec![],
        }
    }

    #[tokio::test]
    async fn catalog_registry_reflects_lookup() {
        let mut catalog = CapCatalog::new();
        catalog.register("plugin-a", vec![cap("cap:in=media:pdf;out=media:png")]);
        let registry = CatalogCapRegistry::new(Arc::new(catalog));
        let request = CapUrn::parse("cap:in=media:pdf;out=*").unwrap();
        let hits = registry.lookup(&request).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(registry.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn media_spec_registry_resolves_builtin_and_reports_not_found() {
        let registry = MediaSpecTableRegistry::default();
        let pdf = registry.resolve(&MediaUrn::parse("media:pdf").unwrap()).await.unwrap();
        assert_eq!(pdf.content_type, "application/pdf");

        let err = registry
            .resolve(&MediaUrn::parse("media:nonexistent-format-xyz").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::NotFound(_)));
    }
}
