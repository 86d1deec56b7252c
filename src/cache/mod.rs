//! Metadata Cache.
//!
//! Read-through, in-memory caches in front of the endpoint repository:
//!
//! - endpoint records, keyed by `{tenant}:{endpoint}`, bounded with a TTL
//!   after write
//! - parsed field-definition lists, keyed by the content hash of their JSON
//!
//! Concurrent misses for the same endpoint key run the loader once and share
//! its result. Loader errors are returned to every waiter and never cached.

mod hash;
pub use hash::content_key;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::sync::Cache;
use serde::Serialize;

use crate::config::CacheSettings;
use crate::model::{Endpoint, EndpointId, FieldDefinition, TenantId};

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub endpoint_entries: u64,
    pub field_entries: u64,
    /// Endpoint lookups served from the cache.
    pub hits: u64,
    /// Endpoint lookups that ran the loader.
    pub misses: u64,
}

/// Endpoint metadata and field-definition caches.
pub struct MetadataCache {
    endpoints: Cache<String, Arc<Endpoint>>,
    fields: Cache<String, Arc<Vec<FieldDefinition>>>,
    lookups: AtomicU64,
    loads: AtomicU64,
}

impl MetadataCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            endpoints: Cache::builder()
                .max_capacity(settings.endpoint_capacity)
                .time_to_live(settings.endpoint_ttl())
                .build(),
            fields: Cache::builder()
                .max_capacity(settings.field_capacity)
                .time_to_live(settings.field_ttl())
                .build(),
            lookups: AtomicU64::new(0),
            loads: AtomicU64::new(0),
        }
    }

    /// Cache key for an endpoint.
    pub fn key(tenant: &TenantId, endpoint: &EndpointId) -> String {
        format!("{}:{}", tenant, endpoint)
    }

    /// Get an endpoint, running `loader` on a miss.
    pub fn get<F, E>(
        &self,
        tenant: &TenantId,
        endpoint: &EndpointId,
        loader: F,
    ) -> Result<Arc<Endpoint>, E>
    where
        F: FnOnce() -> Result<Endpoint, E>,
        E: Clone + Send + Sync + 'static,
    {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let key = Self::key(tenant, endpoint);

        self.endpoints
            .try_get_with(key, || {
                self.loads.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%tenant, %endpoint, "loading endpoint metadata");
                loader().map(Arc::new)
            })
            .map_err(|e| Arc::try_unwrap(e).unwrap_or_else(|shared| (*shared).clone()))
    }

    pub fn invalidate(&self, tenant: &TenantId, endpoint: &EndpointId) {
        self.endpoints.invalidate(&Self::key(tenant, endpoint));
        tracing::debug!(%tenant, %endpoint, "invalidated endpoint metadata");
    }

    pub fn invalidate_all(&self) {
        self.endpoints.invalidate_all();
        self.fields.invalidate_all();
    }

    /// Parse a field-definition list, reusing an earlier parse of the same
    /// JSON.
    pub fn fields(&self, raw: &str) -> Result<Arc<Vec<FieldDefinition>>, serde_json::Error> {
        let key = content_key(raw);
        if let Some(fields) = self.fields.get(&key) {
            return Ok(fields);
        }

        let parsed: Arc<Vec<FieldDefinition>> = Arc::new(serde_json::from_str(raw)?);
        self.fields.insert(key, Arc::clone(&parsed));
        Ok(parsed)
    }

    pub fn stats(&self) -> CacheStats {
        self.endpoints.run_pending_tasks();
        self.fields.run_pending_tasks();

        let lookups = self.lookups.load(Ordering::Relaxed);
        let misses = self.loads.load(Ordering::Relaxed);
        CacheStats {
            endpoint_entries: self.endpoints.entry_count(),
            field_entries: self.fields.entry_count(),
            hits: lookups.saturating_sub(misses),
            misses,
        }
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("stats", &self.stats())
            .finish()
    }
}
