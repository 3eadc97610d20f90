//! Domain Ports - Core type and trait definitions for the location engine
//!
//! These traits define the boundaries between the domain logic and external
//! systems: the geocode provider, the shared key/value cache and the record
//! store. Adapters implement these traits to provide concrete functionality.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheKey;

/// Provider-assigned identifier for a place
pub type ExternalId = u64;

// =============================================================================
// Identifiers
// =============================================================================

/// Local primary key of a country, division or city row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque tenant identifier supplied by the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub u64);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary key of a business entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Typeahead Results
// =============================================================================

/// Hierarchy level of a place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    Country,
    Division,
    City,
}

impl std::fmt::Display for PlaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaceKind::Country => write!(f, "country"),
            PlaceKind::Division => write!(f, "division"),
            PlaceKind::City => write!(f, "city"),
        }
    }
}

/// A normalized place returned by typeahead queries
///
/// Cities carry no code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: ExternalId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a suggestion with a code
    pub fn coded(id: ExternalId, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            code: Some(code.into()),
        }
    }

    /// Create a suggestion without a code
    pub fn named(id: ExternalId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            code: None,
        }
    }
}

// =============================================================================
// Location Selection
// =============================================================================

/// The hidden-field values a client submits after picking a city
///
/// Every field is optional at the transport level. A present
/// `city_external_id` implies the rest should be present too. Ids may arrive
/// as numbers or numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSelection {
    #[serde(default, deserialize_with = "optional_external_id")]
    pub country_external_id: Option<ExternalId>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,

    #[serde(default, deserialize_with = "optional_external_id")]
    pub division_external_id: Option<ExternalId>,
    #[serde(default)]
    pub division_name: Option<String>,
    #[serde(default)]
    pub division_code: Option<String>,

    #[serde(default, deserialize_with = "optional_external_id")]
    pub city_external_id: Option<ExternalId>,
    #[serde(default)]
    pub city_name: Option<String>,
}

impl LocationSelection {
    /// Build a complete selection from the three picked suggestions
    pub fn from_suggestions(country: &Suggestion, division: &Suggestion, city: &Suggestion) -> Self {
        Self {
            country_external_id: Some(country.id),
            country_name: Some(country.name.clone()),
            country_code: country.code.clone(),
            division_external_id: Some(division.id),
            division_name: Some(division.name.clone()),
            division_code: division.code.clone(),
            city_external_id: Some(city.id),
            city_name: Some(city.name.clone()),
        }
    }
}

/// Read a place id sent as a number or a numeric string
///
/// Form clients post hidden fields as strings; blank means nothing was picked.
fn optional_external_id<'de, D>(deserializer: D) -> std::result::Result<Option<ExternalId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireId {
        Number(ExternalId),
        Text(String),
    }

    match Option::<WireId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(WireId::Number(id)) => Ok(Some(id)),
        Some(WireId::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse().map(Some).map_err(|_| {
                serde::de::Error::custom(format!("invalid place id {:?}", text))
            })
        }
    }
}

/// Reference to a materialized city, attached to entities as their location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CityRef {
    pub id: RecordId,
    pub external_id: ExternalId,
}

// =============================================================================
// Hierarchy Records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRecord {
    pub id: RecordId,
    pub external_id: Option<ExternalId>,
    pub iso_code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionRecord {
    pub id: RecordId,
    pub external_id: Option<ExternalId>,
    pub iso_code: String,
    pub name: String,
    pub country_id: RecordId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityRecord {
    pub id: RecordId,
    pub external_id: ExternalId,
    pub name: String,
    pub division_id: RecordId,
}

impl CityRecord {
    pub fn city_ref(&self) -> CityRef {
        CityRef {
            id: self.id,
            external_id: self.external_id,
        }
    }
}

// =============================================================================
// Business Entities
// =============================================================================

/// The record types that carry a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Tenant root company
    Company,
    /// Customer, supplier or other third party
    Counterparty,
    /// Physical stock location
    Warehouse,
}

impl EntityKind {
    /// Whether a save of this kind must carry a city selection
    ///
    /// Companies need a city when created but may be edited without
    /// resubmitting one.
    pub fn requires_location(&self, is_create: bool) -> bool {
        match self {
            EntityKind::Company => is_create,
            EntityKind::Counterparty => false,
            EntityKind::Warehouse => true,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Company => write!(f, "company"),
            EntityKind::Counterparty => write!(f, "counterparty"),
            EntityKind::Warehouse => write!(f, "warehouse"),
        }
    }
}

/// A persisted business record with an optional location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessEntity {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub kind: EntityKind,
    pub name: String,
    pub identifier: Option<String>,
    pub trade_name: Option<String>,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<CityRef>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tenant-scoped unique fields of a business entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    /// Tax or national identifier
    Identifier,
    /// Display name, unique per tenant for warehouses
    Name(EntityKind),
}

/// Aggregate view of where one tenant's active entities are located
///
/// The place counts cover only the countries, divisions and cities those
/// entities point to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSummary {
    pub countries: u64,
    pub divisions: u64,
    pub cities: u64,
    pub located_entities: u64,
    pub top_countries: Vec<CountryUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryUsage {
    pub name: String,
    pub total: u64,
}

// =============================================================================
// GeocodeDirectory Trait (Port)
// =============================================================================

/// Port for the external geocode directory
///
/// Implementations never fail: every transport, status or decoding problem
/// is logged and reported as an empty record list.
#[async_trait]
pub trait GeocodeDirectory: Send + Sync {
    /// Fetch the raw records listed at `url`
    async fn fetch(&self, url: &str) -> Vec<serde_json::Value>;
}

pub type GeocodeDirectoryRef = Arc<dyn GeocodeDirectory>;

// =============================================================================
// KeyValueCache Trait (Port)
// =============================================================================

/// Port for the shared key/value cache
///
/// Lifecycle belongs to the process or an external cache service; the engine
/// only ever receives it injected.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Look up a live entry
    async fn get(&self, key: &CacheKey) -> Result<Option<serde_json::Value>>;

    /// Store an entry that expires after `ttl`
    async fn set(&self, key: CacheKey, value: serde_json::Value, ttl: Duration) -> Result<()>;

    /// Delete a set of keys, returning how many existed
    async fn delete(&self, keys: &[CacheKey]) -> Result<u64>;
}

pub type KeyValueCacheRef = Arc<dyn KeyValueCache>;

// =============================================================================
// RecordStore Trait (Port)
// =============================================================================

/// A write transaction over the record store
///
/// All methods are synchronous so nothing can be awaited while the
/// transaction is open. Dropping the transaction without calling
/// [`StoreTx::commit`] rolls it back.
pub trait StoreTx {
    /// Create or overwrite the country keyed by `iso_code`
    fn upsert_country(
        &mut self,
        iso_code: &str,
        name: &str,
        external_id: Option<ExternalId>,
    ) -> Result<CountryRecord>;

    /// Create or overwrite the division keyed by `iso_code`
    fn upsert_division(
        &mut self,
        iso_code: &str,
        name: &str,
        external_id: Option<ExternalId>,
        country_id: RecordId,
    ) -> Result<DivisionRecord>;

    /// Fetch the city keyed by `external_id`, creating it if missing
    ///
    /// Returns the record and whether it was created.
    fn get_or_create_city(
        &mut self,
        external_id: ExternalId,
        name: &str,
        division_id: RecordId,
    ) -> Result<(CityRecord, bool)>;

    /// Allocate the id for a new entity
    fn next_entity_id(&mut self) -> EntityId;

    /// Insert or replace an entity row
    fn save_entity(&mut self, entity: BusinessEntity) -> Result<BusinessEntity>;

    /// Publish every staged write
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Port for the persistence layer that owns the hierarchy and entity rows
pub trait RecordStore: Send + Sync {
    /// Open a write transaction
    fn begin(&self) -> Result<Box<dyn StoreTx + '_>>;

    fn country_by_iso(&self, iso_code: &str) -> Option<CountryRecord>;

    fn division_by_iso(&self, iso_code: &str) -> Option<DivisionRecord>;

    fn city_by_external_id(&self, external_id: ExternalId) -> Option<CityRecord>;

    fn entity(&self, tenant_id: TenantId, id: EntityId) -> Option<BusinessEntity>;

    /// Find an entity of `tenant_id` holding `value` in `field`
    fn find_entity(
        &self,
        tenant_id: TenantId,
        field: UniqueField,
        value: &str,
        exclude: Option<EntityId>,
    ) -> Option<BusinessEntity>;

    /// Places used by one tenant's active entities, plus its most used countries
    fn location_summary(&self, tenant_id: TenantId, top: usize) -> LocationSummary;
}

pub type RecordStoreRef = Arc<dyn RecordStore>;
