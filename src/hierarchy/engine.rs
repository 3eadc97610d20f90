//! Hierarchy Upsert Engine
//!
//! Materializes a picked Country → Division → City chain as records and
//! returns the city reference entities attach to.
//!
//! ```text
//!   LocationSelection ──► validate ──► begin tx
//!                                        │
//!        upsert Country (by iso_code) ◄──┘   overwrite name / external id
//!                 │
//!        upsert Division (by iso_code)       overwrite, re-parent to country
//!                 │
//!        get-or-create City (by external id) first division wins
//!                 │
//!               CityRef ──► caller persists entity ──► commit
//! ```

use crate::domain::ports::{CityRef, ExternalId, LocationSelection, RecordStoreRef, StoreTx};
use crate::error::{Error, Result};
use tracing::{debug, info};

/// A selection with every field needed for the three writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub country_external_id: Option<ExternalId>,
    pub country_name: String,
    pub country_code: String,
    pub division_external_id: Option<ExternalId>,
    pub division_name: String,
    pub division_code: String,
    pub city_external_id: ExternalId,
    pub city_name: String,
}

impl ResolvedSelection {
    /// Check a submitted selection
    ///
    /// Returns `None` when no city was picked. A picked city without the
    /// names and codes of its parents is rejected before anything is written.
    pub fn resolve(selection: &LocationSelection) -> Result<Option<Self>> {
        let Some(city_external_id) = selection.city_external_id else {
            return Ok(None);
        };

        Ok(Some(Self {
            country_external_id: selection.country_external_id,
            country_name: required(&selection.country_name, "country_name")?,
            country_code: required(&selection.country_code, "country_code")?.to_uppercase(),
            division_external_id: selection.division_external_id,
            division_name: required(&selection.division_name, "division_name")?,
            division_code: required(&selection.division_code, "division_code")?.to_uppercase(),
            city_external_id,
            city_name: required(&selection.city_name, "city_name")?,
        }))
    }
}

fn required(value: &Option<String>, field: &'static str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(Error::IncompleteSelection { field })
}

/// Saves location selections into the record store
pub struct HierarchyUpsertEngine {
    store: RecordStoreRef,
}

impl HierarchyUpsertEngine {
    pub fn new(store: RecordStoreRef) -> Self {
        Self { store }
    }

    /// Save a selection in its own transaction
    ///
    /// `location_required` decides whether a missing city is an error or
    /// simply "no location".
    pub fn save_location(
        &self,
        selection: &LocationSelection,
        location_required: bool,
    ) -> Result<Option<CityRef>> {
        let Some(resolved) = Self::check(selection, location_required)? else {
            return Ok(None);
        };

        let mut tx = self.store.begin()?;
        let city = Self::write(tx.as_mut(), &resolved)?;
        tx.commit()?;
        Ok(Some(city))
    }

    /// Validate a selection against the caller's location policy
    pub fn check(selection: &LocationSelection, location_required: bool) -> Result<Option<ResolvedSelection>> {
        match ResolvedSelection::resolve(selection)? {
            Some(resolved) => Ok(Some(resolved)),
            None if location_required => Err(Error::LocationRequired),
            None => Ok(None),
        }
    }

    /// Perform the three writes inside a caller-owned transaction
    pub fn write(tx: &mut dyn StoreTx, selection: &ResolvedSelection) -> Result<CityRef> {
        let country = tx.upsert_country(
            &selection.country_code,
            &selection.country_name,
            selection.country_external_id,
        )?;

        let division = tx.upsert_division(
            &selection.division_code,
            &selection.division_name,
            selection.division_external_id,
            country.id,
        )?;

        let (city, created) =
            tx.get_or_create_city(selection.city_external_id, &selection.city_name, division.id)?;

        if created {
            info!(
                city = %city.name,
                external_id = city.external_id,
                division = %division.iso_code,
                "Created city"
            );
        } else if city.division_id != division.id {
            debug!(
                external_id = city.external_id,
                submitted_division = %division.iso_code,
                "City already assigned to another division, keeping it"
            );
        }

        Ok(city.city_ref())
    }
}

// =============================================================================
// Tests
// =============================================================================
