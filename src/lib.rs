//! Geo Location Engine - Location Resolution & Caching
//!
//! Resolves Country → Division → City typeahead selections against an
//! external geocode directory and materializes them as deduplicated records
//! that business entities (companies, counterparties, warehouses) point to.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              REST API (axum)                                 │
//! ├──────────────────────────────────────┬──────────────────────────────────────┤
//! │          TypeaheadResolver           │            EntityService             │
//! │  cache-first country/division/city   │  normalize → UniquenessGuard →       │
//! │  substring filter + name ordering    │  HierarchyUpsertEngine (one tx)      │
//! ├──────────────────┬───────────────────┼──────────────────────────────────────┤
//! │   TieredCache    │   GeocodeClient   │            RecordStore               │
//! │  per-class TTLs  │  timeout / 429 →  │  Country ─► Division ─► City         │
//! │  no negative     │  empty result     │  upsert     upsert      get-or-create │
//! │  caching         │                   │                                      │
//! └──────────────────┴───────────────────┴──────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`api`]: REST router and server
//! - [`cache`]: Tiered TTL cache in front of the provider
//! - [`config`]: Engine configuration
//! - [`domain`]: Core domain types and ports
//! - [`entity`]: Entity save path and uniqueness checks
//! - [`error`]: Error types and handling
//! - [`geocode`]: Geocode provider client
//! - [`hierarchy`]: Record store and hierarchy upsert
//! - [`typeahead`]: Typeahead queries

pub mod api;
pub mod cache;
pub mod config;
pub mod domain;
pub mod entity;
pub mod error;
pub mod geocode;
pub mod hierarchy;
pub mod typeahead;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig, RestRouter};

pub use cache::{CacheKey, CacheStatsSnapshot, MemoryCache, QueryClass, TieredCache, TtlPolicy};

pub use config::{CacheConfig, EngineConfig, GeocodeConfig, TypeaheadConfig};

pub use domain::ports::{
    BusinessEntity, CityRef, EntityId, EntityKind, ExternalId, GeocodeDirectory,
    GeocodeDirectoryRef, KeyValueCache, KeyValueCacheRef, LocationSelection, LocationSummary,
    PlaceKind, RecordId, RecordStore, RecordStoreRef, StoreTx, Suggestion, TenantId,
};

pub use entity::{EntityDraft, EntityService, UniquenessGuard};

pub use error::{Error, Result};

pub use geocode::{GeocodeClient, GeocodeCountersSnapshot, GeocodeEndpoints};

pub use hierarchy::{HierarchyUpsertEngine, MemoryRecordStore};

pub use typeahead::TypeaheadResolver;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
