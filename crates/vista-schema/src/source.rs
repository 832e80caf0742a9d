//! Allow-list sources.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vista_core::SchemaCacheConfig;
use vista_guard::AllowedTableSet;

use crate::cache::{Clock, TtlCache};

/// Resolves the tables a data source's queries may reference.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn allowed_tables(&self, data_source: &str) -> anyhow::Result<AllowedTableSet>;
}

#[async_trait]
impl<S: SchemaSource + ?Sized> SchemaSource for Arc<S> {
    async fn allowed_tables(&self, data_source: &str) -> anyhow::Result<AllowedTableSet> {
        (**self).allowed_tables(data_source).await
    }
}

/// Fixed allow-lists, usually loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaSource {
    sets: HashMap<String, AllowedTableSet>,
}

impl StaticSchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(mut self, data_source: impl Into<String>, tables: AllowedTableSet) -> Self {
        self.sets.insert(data_source.into(), tables);
        self
    }
}

#[async_trait]
impl SchemaSource for StaticSchemaSource {
    async fn allowed_tables(&self, data_source: &str) -> anyhow::Result<AllowedTableSet> {
        self.sets
            .get(data_source)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown data source '{}'", data_source))
    }
}

/// Wraps a source with per-data-source expiry caching.
///
/// Failed lookups are not cached.
pub struct CachedSchemaSource<S> {
    inner: S,
    cache: TtlCache<String, AllowedTableSet>,
}

impl<S: SchemaSource> CachedSchemaSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
        }
    }

    pub fn from_config(inner: S, config: &SchemaCacheConfig) -> Self {
        Self::new(inner, config.ttl())
    }

    pub fn with_clock(inner: S, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            cache: TtlCache::with_clock(ttl, clock),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Force the next lookup for `data_source` to hit the inner source.
    pub fn invalidate(&self, data_source: &str) {
        if self.cache.invalidate(&data_source.to_string()) {
            tracing::debug!(data_source, "Allow-list cache entry invalidated");
        }
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[async_trait]
impl<S: SchemaSource> SchemaSource for CachedSchemaSource<S> {
    async fn allowed_tables(&self, data_source: &str) -> anyhow::Result<AllowedTableSet> {
        let key = data_source.to_string();
        if let Some(tables) = self.cache.get(&key) {
            tracing::trace!(data_source, "Allow-list cache hit");
            return Ok(tables);
        }

        let tables = self.inner.allowed_tables(data_source).await?;
        tracing::debug!(
            data_source,
            tables = tables.len(),
            ttl_secs = self.cache.ttl().as_secs(),
            "Allow-list refreshed"
        );
        self.cache.insert(key, tables.clone());
        Ok(tables)
    }
}

impl<S> std::fmt::Debug for CachedSchemaSource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSchemaSource")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
