//! Tiered Geocode Cache
//!
//! A TTL cache in front of the geocode provider. Each query class has its own
//! lifetime:
//! - **Country list**: 24h
//! - **Divisions per country**: 6h
//! - **Cities per division**: 2h
//! - **Derived aggregates**: 5m
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            TieredCache                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────────┐ │
//! │  │  TtlPolicy   │   │ CacheMetrics │   │  KeyValueCache (injected)    │ │
//! │  │ per class    │   │ (atomics)    │   │  MemoryCache / external      │ │
//! │  └──────────────┘   └──────────────┘   └──────────────────────────────┘ │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  • Only non-empty upstream results are written (no negative caching)    │
//! │  • TTL-only eviction, one entry per country / division                  │
//! │  • Backend failures degrade to a miss                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use geo_location_engine::cache::{CacheKey, TieredCache, TtlPolicy};
//!
//! let cache = TieredCache::in_memory(TtlPolicy::default());
//! let key = CacheKey::countries("es");
//!
//! if cache.get::<Vec<Suggestion>>(&key).await.is_none() {
//!     let fetched = fetch_upstream().await;
//!     cache.put_records(&key, &fetched).await;
//! }
//! println!("Hit ratio: {:.2}%", cache.stats().hit_ratio() * 100.0);
//! ```

pub mod entry;
pub mod manager;
pub mod metrics;
pub mod storage;
pub mod tier;

use crate::domain::ports::TenantId;

// Re-export main types
pub use entry::{CacheEntry, CacheKey, AGGREGATE_NAMESPACE, LOCATION_SUMMARY_KEY};
pub use manager::TieredCache;
pub use metrics::{CacheMetrics, CacheStatsSnapshot};
pub use storage::MemoryCache;
pub use tier::{QueryClass, TtlPolicy, AGGREGATE_TTL, CITIES_TTL, COUNTRY_LIST_TTL, DIVISIONS_TTL};

/// Derived aggregate keys of one tenant, dropped after each of its saves
pub fn aggregate_keys(tenant_id: TenantId) -> Vec<CacheKey> {
    vec![CacheKey::location_summary(tenant_id)]
}
