//! Query Class Definitions
//!
//! Every cached upstream list belongs to one query class, and each class has
//! its own time-to-live. Administrative geography rarely changes, so the
//! longer lists near the top of the hierarchy are kept longer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// =============================================================================
// Default Lifetimes
// =============================================================================

/// Country list lifetime: 24 hours
pub const COUNTRY_LIST_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Divisions-per-country lifetime: 6 hours
pub const DIVISIONS_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Cities-per-division lifetime: 2 hours
pub const CITIES_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Derived aggregate lifetime: 5 minutes
pub const AGGREGATE_TTL: Duration = Duration::from_secs(5 * 60);

// =============================================================================
// Query Class
// =============================================================================

/// Class of a cached query, selecting its TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryClass {
    /// Full country list
    CountryList,
    /// First-level divisions of one country
    DivisionsByCountry,
    /// Populated places of one division
    CitiesByDivision,
    /// Aggregates derived from local records
    Aggregate,
}

impl QueryClass {
    /// Key namespace used by this class
    pub fn namespace(&self) -> &'static str {
        match self {
            QueryClass::CountryList => "countries",
            QueryClass::DivisionsByCountry => "divisions",
            QueryClass::CitiesByDivision => "cities",
            QueryClass::Aggregate => "aggregate",
        }
    }

    /// Resolve a key namespace back to its class
    ///
    /// Unknown namespaces are treated as aggregates, the shortest-lived class.
    pub fn from_namespace(namespace: &str) -> Self {
        match namespace {
            "countries" => QueryClass::CountryList,
            "divisions" => QueryClass::DivisionsByCountry,
            "cities" => QueryClass::CitiesByDivision,
            _ => QueryClass::Aggregate,
        }
    }
}

impl fmt::Display for QueryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryClass::CountryList => write!(f, "country-list"),
            QueryClass::DivisionsByCountry => write!(f, "divisions-by-country"),
            QueryClass::CitiesByDivision => write!(f, "cities-by-division"),
            QueryClass::Aggregate => write!(f, "aggregate"),
        }
    }
}

// =============================================================================
// TTL Policy
// =============================================================================

/// Per-class time-to-live policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub country_list: Duration,
    pub divisions: Duration,
    pub cities: Duration,
    pub aggregate: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            country_list: COUNTRY_LIST_TTL,
            divisions: DIVISIONS_TTL,
            cities: CITIES_TTL,
            aggregate: AGGREGATE_TTL,
        }
    }
}

impl TtlPolicy {
    /// Lifetime for entries of `class`
    pub fn ttl_for(&self, class: QueryClass) -> Duration {
        match class {
            QueryClass::CountryList => self.country_list,
            QueryClass::DivisionsByCountry => self.divisions,
            QueryClass::CitiesByDivision => self.cities,
            QueryClass::Aggregate => self.aggregate,
        }
    }
}
