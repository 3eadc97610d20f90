//! Cache Entry Types
//!
//! Defines cache keys and the expiring entries stored behind them.

use crate::cache::tier::QueryClass;
use crate::domain::ports::{ExternalId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// =============================================================================
// Cache Key
// =============================================================================

/// Namespace for the derived aggregate keys
pub const AGGREGATE_NAMESPACE: &str = "aggregate";

/// Aggregate key of the location summary
pub const LOCATION_SUMMARY_KEY: &str = "location_summary";

/// Unique identifier for cached data
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Namespace (e.g., "countries", "divisions", "cities", "aggregate")
    pub namespace: String,
    /// Identifier within the namespace
    pub id: String,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
        }
    }

    /// Key of the full country list in `lang`
    pub fn countries(lang: &str) -> Self {
        Self::new(QueryClass::CountryList.namespace(), lang)
    }

    /// Key of the division list of one country in `lang`
    pub fn divisions(country_id: ExternalId, lang: &str) -> Self {
        Self::new(
            QueryClass::DivisionsByCountry.namespace(),
            format!("{}/{}", country_id, lang),
        )
    }

    /// Key of the city list of one division in `lang`
    pub fn cities(division_id: ExternalId, lang: &str) -> Self {
        Self::new(
            QueryClass::CitiesByDivision.namespace(),
            format!("{}/{}", division_id, lang),
        )
    }

    /// Key of a derived aggregate
    pub fn aggregate(name: impl Into<String>) -> Self {
        Self::new(AGGREGATE_NAMESPACE, name)
    }

    /// Key of one tenant's location summary
    pub fn location_summary(tenant_id: TenantId) -> Self {
        Self::aggregate(format!("{}/{}", LOCATION_SUMMARY_KEY, tenant_id))
    }

    /// Query class this key belongs to
    pub fn query_class(&self) -> QueryClass {
        QueryClass::from_namespace(&self.namespace)
    }

    /// Get a string representation for storage
    pub fn to_storage_key(&self) -> String {
        format!("{}:{}", self.namespace, self.id)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_storage_key())
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

/// A cached value with its expiry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key identifying this entry
    pub key: CacheKey,
    /// Cached JSON value
    pub value: serde_json::Value,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// When the entry stops being served
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create a new entry that lives for `ttl`
    pub fn new(key: CacheKey, value: serde_json::Value, ttl: Duration) -> Self {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(3650));
        Self {
            key,
            value,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Check whether the entry has expired at `now`
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
