//! Entity Save Path
//!
//! Create and update for business entities that carry a location:
//! normalize, check uniqueness, apply the kind's location policy, then write
//! the hierarchy and the entity in one transaction. Derived aggregates are
//! dropped from the cache once the transaction has committed.

use crate::cache::{aggregate_keys, CacheKey, TieredCache};
use crate::domain::ports::{
    BusinessEntity, EntityId, LocationSelection, LocationSummary, RecordStoreRef, TenantId,
    UniqueField,
};
use crate::entity::draft::EntityDraft;
use crate::entity::guard::UniquenessGuard;
use crate::error::{Error, Result};
use crate::hierarchy::{HierarchyUpsertEngine, ResolvedSelection};
use chrono::Utc;
use tracing::{debug, info};

/// Number of countries listed in the location summary
pub const TOP_COUNTRIES: usize = 5;

pub struct EntityService {
    store: RecordStoreRef,
    guard: UniquenessGuard,
    cache: TieredCache,
}

impl EntityService {
    pub fn new(store: RecordStoreRef, cache: TieredCache) -> Self {
        Self {
            guard: UniquenessGuard::new(store.clone()),
            store,
            cache,
        }
    }

    /// Create an entity with its location
    pub async fn create(
        &self,
        tenant_id: TenantId,
        draft: EntityDraft,
        selection: &LocationSelection,
    ) -> Result<BusinessEntity> {
        let draft = draft.normalized()?;
        self.guard.ensure_unique(tenant_id, &draft, None)?;
        let resolved = HierarchyUpsertEngine::check(selection, draft.kind.requires_location(true))?;

        let saved = self.persist_new(tenant_id, draft, resolved.as_ref())?;
        info!(tenant = %tenant_id, id = %saved.id, kind = %saved.kind, "Entity created");

        self.invalidate_aggregates(tenant_id).await;
        Ok(saved)
    }

    /// Update an entity, optionally moving it to a new location
    ///
    /// Without a city selection the stored city is kept, unless the kind
    /// always requires one to be submitted.
    pub async fn update(
        &self,
        tenant_id: TenantId,
        id: EntityId,
        draft: EntityDraft,
        selection: &LocationSelection,
    ) -> Result<BusinessEntity> {
        let existing = self
            .store
            .entity(tenant_id, id)
            .ok_or_else(|| Error::RecordNotFound {
                kind: "entity",
                id: id.to_string(),
            })?;

        let draft = draft.normalized()?;
        if draft.kind != existing.kind {
            return Err(Error::Validation {
                field: "kind",
                message: format!("cannot change a {} into a {}", existing.kind, draft.kind),
            });
        }
        self.guard.ensure_unique(tenant_id, &draft, Some(id))?;
        let resolved = HierarchyUpsertEngine::check(selection, draft.kind.requires_location(false))?;

        let saved = self.persist_existing(existing, draft, resolved.as_ref())?;
        info!(tenant = %tenant_id, id = %saved.id, kind = %saved.kind, "Entity updated");

        self.invalidate_aggregates(tenant_id).await;
        Ok(saved)
    }

    /// Name of the tenant's entity holding `identifier`, if any
    pub fn verify_identifier(&self, tenant_id: TenantId, identifier: &str) -> Option<String> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }
        self.store
            .find_entity(tenant_id, UniqueField::Identifier, identifier, None)
            .map(|entity| entity.name)
    }

    /// Where the tenant's entities are located, cached per tenant
    pub async fn location_summary(&self, tenant_id: TenantId) -> LocationSummary {
        let key = CacheKey::location_summary(tenant_id);
        if let Some(summary) = self.cache.get::<LocationSummary>(&key).await {
            return summary;
        }

        let summary = self.store.location_summary(tenant_id, TOP_COUNTRIES);
        self.cache.put(&key, &summary).await;
        summary
    }

    fn persist_new(
        &self,
        tenant_id: TenantId,
        draft: EntityDraft,
        location: Option<&ResolvedSelection>,
    ) -> Result<BusinessEntity> {
        let mut tx = self.store.begin()?;
        let city = location
            .map(|selection| HierarchyUpsertEngine::write(tx.as_mut(), selection))
            .transpose()
            .map_err(aborted)?;

        let id = tx.next_entity_id();
        let entity = draft.into_entity(id, tenant_id, city, Utc::now());
        let saved = tx.save_entity(entity).map_err(aborted)?;
        tx.commit()?;
        Ok(saved)
    }

    fn persist_existing(
        &self,
        existing: BusinessEntity,
        draft: EntityDraft,
        location: Option<&ResolvedSelection>,
    ) -> Result<BusinessEntity> {
        let mut tx = self.store.begin()?;
        let city = match location {
            Some(selection) => {
                Some(HierarchyUpsertEngine::write(tx.as_mut(), selection).map_err(aborted)?)
            }
            None => existing.city,
        };

        let entity = draft.into_entity(existing.id, existing.tenant_id, city, existing.created_at);
        let saved = tx.save_entity(entity).map_err(aborted)?;
        tx.commit()?;
        Ok(saved)
    }

    async fn invalidate_aggregates(&self, tenant_id: TenantId) {
        let removed = self.cache.invalidate(&aggregate_keys(tenant_id)).await;
        debug!(tenant = %tenant_id, removed, "Derived aggregates invalidated");
    }
}

/// Classify a constraint hit inside the save transaction
///
/// The entity constraints can only trip when a concurrent save won the race
/// after the guard ran, so they keep their field. Any other constraint
/// aborts the save as a whole.
fn aborted(err: Error) -> Error {
    match err {
        Error::ConstraintViolation {
            constraint: "entity.tenant_identifier",
            value,
        } => Error::DuplicateIdentifier { identifier: value },
        Error::ConstraintViolation {
            constraint: "warehouse.tenant_name",
            value,
        } => Error::Validation {
            field: "name",
            message: format!("a warehouse named {} already exists", value),
        },
        Error::ConstraintViolation { constraint, value } => {
            Error::Transaction(format!("{} = {} is already taken", constraint, value))
        }
        other => other,
    }
}

// =============================================================================
// Tests
// =============================================================================
