//! Tiered Cache
//!
//! Applies the per-class TTL policy in front of an injected key/value store
//! and decides whether an upstream call is needed.

use crate::cache::entry::CacheKey;
use crate::cache::metrics::{CacheMetrics, CacheStatsSnapshot};
use crate::cache::storage::MemoryCache;
use crate::cache::tier::TtlPolicy;
use crate::domain::ports::KeyValueCacheRef;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache front-end shared by the typeahead resolver and the aggregates
///
/// Backend failures never propagate: a failed read is a miss and a failed
/// write is logged and dropped.
#[derive(Clone)]
pub struct TieredCache {
    store: KeyValueCacheRef,
    policy: TtlPolicy,
    metrics: Arc<CacheMetrics>,
}

impl TieredCache {
    /// Create a cache over an injected store
    pub fn new(store: KeyValueCacheRef, policy: TtlPolicy) -> Self {
        Self {
            store,
            policy,
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    /// Create a cache over a fresh process-local memory store
    pub fn in_memory(policy: TtlPolicy) -> Self {
        Self::new(Arc::new(MemoryCache::new()), policy)
    }

    /// Read and decode a live entry
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let value = match self.store.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                self.metrics.record_miss();
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                self.metrics.record_backend_error();
                self.metrics.record_miss();
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(decoded) => {
                debug!(key = %key, "Cache hit");
                self.metrics.record_hit();
                Some(decoded)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value has unexpected shape, treating as miss");
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Store a list of upstream records under its class TTL
    ///
    /// Empty lists are never stored, so an outage or a rate-limited
    /// response is retried on the next request. Returns whether a write
    /// happened.
    pub async fn put_records<T: Serialize>(&self, key: &CacheKey, records: &[T]) -> bool {
        if records.is_empty() {
            debug!(key = %key, "Skipping cache write for empty result");
            self.metrics.record_skipped_empty();
            return false;
        }
        self.put(key, records).await
    }

    /// Store any serializable value under its class TTL
    pub async fn put<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Value could not be serialized for caching");
                return false;
            }
        };

        let ttl = self.policy.ttl_for(key.query_class());
        match self.store.set(key.clone(), value, ttl).await {
            Ok(()) => {
                debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache write");
                self.metrics.record_write();
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache write failed");
                self.metrics.record_backend_error();
                false
            }
        }
    }

    /// Delete a set of keys, returning how many existed
    pub async fn invalidate(&self, keys: &[CacheKey]) -> u64 {
        match self.store.delete(keys).await {
            Ok(removed) => {
                self.metrics.record_deletes(removed);
                removed
            }
            Err(e) => {
                warn!(error = %e, keys = keys.len(), "Cache invalidation failed");
                self.metrics.record_backend_error();
                0
            }
        }
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.metrics.snapshot()
    }
}

// =============================================================================
// Tests
// =============================================================================
