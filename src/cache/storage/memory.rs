//! In-Memory Cache Store
//!
//! Process-wide key/value store using DashMap for concurrent access. Entries
//! expire by TTL only; there is no capacity bound since the key space is one
//! entry per country and per division.

use crate::cache::entry::{CacheEntry, CacheKey};
use crate::domain::ports::KeyValueCache;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::time::Duration;
use tracing::debug;

// =============================================================================
// Memory Cache
// =============================================================================

/// TTL-expiring in-memory cache backed by DashMap
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
        }
        purged
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<serde_json::Value>> {
        let storage_key = key.to_storage_key();
        let now = Utc::now();

        let value = match self.entries.get(&storage_key) {
            Some(entry) if !entry.is_expired_at(now) => Some(entry.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };

        if value.is_none() {
            // Expired entries are dropped lazily on read
            self.entries
                .remove_if(&storage_key, |_, entry| entry.is_expired_at(now));
        }
        Ok(value)
    }

    async fn set(&self, key: CacheKey, value: serde_json::Value, ttl: Duration) -> Result<()> {
        let storage_key = key.to_storage_key();
        self.entries
            .insert(storage_key, CacheEntry::new(key, value, ttl));
        Ok(())
    }

    async fn delete(&self, keys: &[CacheKey]) -> Result<u64> {
        let removed = keys
            .iter()
            .filter(|key| self.entries.remove(&key.to_storage_key()).is_some())
            .count();
        Ok(removed as u64)
    }
}

// =============================================================================
// Tests
// =============================================================================
