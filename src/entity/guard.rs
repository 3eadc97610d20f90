//! Uniqueness Guard
//!
//! Tenant-scoped uniqueness checks run before the save transaction opens,
//! so a conflict is reported on its form field and nothing is written.

use crate::domain::ports::{EntityId, EntityKind, RecordStoreRef, TenantId, UniqueField};
use crate::entity::draft::EntityDraft;
use crate::error::{Error, Result};
use tracing::debug;

pub struct UniquenessGuard {
    store: RecordStoreRef,
}

impl UniquenessGuard {
    pub fn new(store: RecordStoreRef) -> Self {
        Self { store }
    }

    /// Whether `candidate` is free as an identifier within the tenant
    ///
    /// `exclude` is the entity being edited, which may keep its own value.
    pub fn check_unique(&self, tenant_id: TenantId, candidate: &str, exclude: Option<EntityId>) -> bool {
        self.check_unique_field(tenant_id, UniqueField::Identifier, candidate, exclude)
    }

    pub fn check_unique_field(
        &self,
        tenant_id: TenantId,
        field: UniqueField,
        candidate: &str,
        exclude: Option<EntityId>,
    ) -> bool {
        self.store
            .find_entity(tenant_id, field, candidate, exclude)
            .is_none()
    }

    /// Reject a normalized draft that collides with another entity
    pub fn ensure_unique(
        &self,
        tenant_id: TenantId,
        draft: &EntityDraft,
        exclude: Option<EntityId>,
    ) -> Result<()> {
        if let Some(identifier) = draft.identifier.as_deref() {
            if !self.check_unique(tenant_id, identifier, exclude) {
                debug!(tenant = %tenant_id, identifier, "Duplicate identifier rejected");
                return Err(Error::DuplicateIdentifier {
                    identifier: identifier.to_string(),
                });
            }
        }

        if draft.kind == EntityKind::Warehouse
            && !self.check_unique_field(
                tenant_id,
                UniqueField::Name(EntityKind::Warehouse),
                &draft.name,
                exclude,
            )
        {
            return Err(Error::Validation {
                field: "name",
                message: format!("a warehouse named '{}' already exists", draft.name),
            });
        }

        Ok(())
    }
}
