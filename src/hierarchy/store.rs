//! In-Memory Record Store
//!
//! Transactional storage for the place hierarchy and the business entities.
//! A transaction takes the writer lock, works on a staged copy of the state
//! and swaps it in on commit. Dropping it discards the copy.
//!
//! Reads take the same lock, so they wait while a transaction is open.

use crate::domain::ports::{
    BusinessEntity, CityRecord, CountryRecord, CountryUsage, DivisionRecord, EntityId, EntityKind,
    ExternalId, LocationSummary, RecordId, RecordStore, StoreTx, TenantId, UniqueField,
};
use crate::error::{Error, Result};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Default)]
struct StoreState {
    countries: BTreeMap<RecordId, CountryRecord>,
    divisions: BTreeMap<RecordId, DivisionRecord>,
    cities: BTreeMap<RecordId, CityRecord>,
    entities: BTreeMap<EntityId, BusinessEntity>,
    last_record_id: u64,
    last_entity_id: u64,
}

impl StoreState {
    fn allocate_record_id(&mut self) -> RecordId {
        self.last_record_id += 1;
        RecordId(self.last_record_id)
    }

    fn country_by_iso(&self, iso_code: &str) -> Option<&CountryRecord> {
        self.countries.values().find(|c| c.iso_code == iso_code)
    }

    fn division_by_iso(&self, iso_code: &str) -> Option<&DivisionRecord> {
        self.divisions.values().find(|d| d.iso_code == iso_code)
    }

    fn city_by_external_id(&self, external_id: ExternalId) -> Option<&CityRecord> {
        self.cities.values().find(|c| c.external_id == external_id)
    }

    fn find_entity(
        &self,
        tenant_id: TenantId,
        field: UniqueField,
        value: &str,
        exclude: Option<EntityId>,
    ) -> Option<&BusinessEntity> {
        self.entities.values().find(|e| {
            e.tenant_id == tenant_id
                && Some(e.id) != exclude
                && match field {
                    UniqueField::Identifier => e.identifier.as_deref() == Some(value),
                    UniqueField::Name(kind) => e.kind == kind && e.name == value,
                }
        })
    }

    /// Country name behind a city, following division then country
    fn country_of_city(&self, city_id: RecordId) -> Option<&CountryRecord> {
        let city = self.cities.get(&city_id)?;
        let division = self.divisions.get(&city.division_id)?;
        self.countries.get(&division.country_id)
    }
}

// =============================================================================
// Store
// =============================================================================

/// Process-local [`RecordStore`] with unique constraints
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<StoreState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn country_count(&self) -> usize {
        self.state.lock().countries.len()
    }

    pub fn division_count(&self) -> usize {
        self.state.lock().divisions.len()
    }

    pub fn city_count(&self) -> usize {
        self.state.lock().cities.len()
    }

    pub fn entity_count(&self) -> usize {
        self.state.lock().entities.len()
    }
}

impl RecordStore for MemoryRecordStore {
    fn begin(&self) -> Result<Box<dyn StoreTx + '_>> {
        let guard = self.state.lock();
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }

    fn country_by_iso(&self, iso_code: &str) -> Option<CountryRecord> {
        self.state.lock().country_by_iso(iso_code).cloned()
    }

    fn division_by_iso(&self, iso_code: &str) -> Option<DivisionRecord> {
        self.state.lock().division_by_iso(iso_code).cloned()
    }

    fn city_by_external_id(&self, external_id: ExternalId) -> Option<CityRecord> {
        self.state.lock().city_by_external_id(external_id).cloned()
    }

    fn entity(&self, tenant_id: TenantId, id: EntityId) -> Option<BusinessEntity> {
        self.state
            .lock()
            .entities
            .get(&id)
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
    }

    fn find_entity(
        &self,
        tenant_id: TenantId,
        field: UniqueField,
        value: &str,
        exclude: Option<EntityId>,
    ) -> Option<BusinessEntity> {
        self.state
            .lock()
            .find_entity(tenant_id, field, value, exclude)
            .cloned()
    }

    fn location_summary(&self, tenant_id: TenantId, top: usize) -> LocationSummary {
        let state = self.state.lock();

        let mut countries = BTreeSet::new();
        let mut divisions = BTreeSet::new();
        let mut cities = BTreeSet::new();
        let mut usage: HashMap<&str, u64> = HashMap::new();
        let mut located_entities = 0;

        let located = state
            .entities
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.active)
            .filter_map(|e| e.city);
        for city in located {
            located_entities += 1;
            cities.insert(city.id);
            let Some(division_id) = state.cities.get(&city.id).map(|c| c.division_id) else {
                continue;
            };
            divisions.insert(division_id);
            if let Some(country) = state.country_of_city(city.id) {
                countries.insert(country.id);
                *usage.entry(country.name.as_str()).or_default() += 1;
            }
        }

        let mut top_countries: Vec<CountryUsage> = usage
            .into_iter()
            .map(|(name, total)| CountryUsage {
                name: name.to_string(),
                total,
            })
            .collect();
        top_countries.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
        top_countries.truncate(top);

        LocationSummary {
            countries: countries.len() as u64,
            divisions: divisions.len() as u64,
            cities: cities.len() as u64,
            located_entities,
            top_countries,
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

struct MemoryTx<'a> {
    guard: MutexGuard<'a, StoreState>,
    staged: StoreState,
}

impl StoreTx for MemoryTx<'_> {
    fn upsert_country(
        &mut self,
        iso_code: &str,
        name: &str,
        external_id: Option<ExternalId>,
    ) -> Result<CountryRecord> {
        let existing = self.staged.country_by_iso(iso_code).map(|c| c.id);

        if let Some(ext) = external_id {
            let taken = self
                .staged
                .countries
                .values()
                .any(|c| c.external_id == Some(ext) && Some(c.id) != existing);
            if taken {
                return Err(Error::ConstraintViolation {
                    constraint: "country.external_id",
                    value: ext.to_string(),
                });
            }
        }

        let id = existing.unwrap_or_else(|| self.staged.allocate_record_id());
        let record = CountryRecord {
            id,
            external_id,
            iso_code: iso_code.to_string(),
            name: name.to_string(),
        };
        self.staged.countries.insert(id, record.clone());
        Ok(record)
    }

    fn upsert_division(
        &mut self,
        iso_code: &str,
        name: &str,
        external_id: Option<ExternalId>,
        country_id: RecordId,
    ) -> Result<DivisionRecord> {
        if !self.staged.countries.contains_key(&country_id) {
            return Err(Error::RecordNotFound {
                kind: "country",
                id: country_id.to_string(),
            });
        }

        let existing = self.staged.division_by_iso(iso_code).map(|d| d.id);

        if let Some(ext) = external_id {
            let taken = self
                .staged
                .divisions
                .values()
                .any(|d| d.external_id == Some(ext) && Some(d.id) != existing);
            if taken {
                return Err(Error::ConstraintViolation {
                    constraint: "division.external_id",
                    value: ext.to_string(),
                });
            }
        }

        let id = existing.unwrap_or_else(|| self.staged.allocate_record_id());
        let record = DivisionRecord {
            id,
            external_id,
            iso_code: iso_code.to_string(),
            name: name.to_string(),
            country_id,
        };
        self.staged.divisions.insert(id, record.clone());
        Ok(record)
    }

    fn get_or_create_city(
        &mut self,
        external_id: ExternalId,
        name: &str,
        division_id: RecordId,
    ) -> Result<(CityRecord, bool)> {
        if let Some(city) = self.staged.city_by_external_id(external_id) {
            return Ok((city.clone(), false));
        }

        if !self.staged.divisions.contains_key(&division_id) {
            return Err(Error::RecordNotFound {
                kind: "division",
                id: division_id.to_string(),
            });
        }

        let id = self.staged.allocate_record_id();
        let record = CityRecord {
            id,
            external_id,
            name: name.to_string(),
            division_id,
        };
        self.staged.cities.insert(id, record.clone());
        Ok((record, true))
    }

    fn next_entity_id(&mut self) -> EntityId {
        self.staged.last_entity_id += 1;
        EntityId(self.staged.last_entity_id)
    }

    fn save_entity(&mut self, entity: BusinessEntity) -> Result<BusinessEntity> {
        if let Some(identifier) = entity.identifier.as_deref() {
            if self
                .staged
                .find_entity(entity.tenant_id, UniqueField::Identifier, identifier, Some(entity.id))
                .is_some()
            {
                return Err(Error::ConstraintViolation {
                    constraint: "entity.tenant_identifier",
                    value: identifier.to_string(),
                });
            }
        }

        if entity.kind == EntityKind::Warehouse
            && self
                .staged
                .find_entity(
                    entity.tenant_id,
                    UniqueField::Name(EntityKind::Warehouse),
                    &entity.name,
                    Some(entity.id),
                )
                .is_some()
        {
            return Err(Error::ConstraintViolation {
                constraint: "warehouse.tenant_name",
                value: entity.name.clone(),
            });
        }

        if let Some(city) = entity.city {
            if !self.staged.cities.contains_key(&city.id) {
                return Err(Error::RecordNotFound {
                    kind: "city",
                    id: city.id.to_string(),
                });
            }
        }

        self.staged.entities.insert(entity.id, entity.clone());
        Ok(entity)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { mut guard, staged } = *self;
        debug!(
            countries = staged.countries.len(),
            divisions = staged.divisions.len(),
            cities = staged.cities.len(),
            entities = staged.entities.len(),
            "Committing record store transaction"
        );
        *guard = staged;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
