//! Business Entities
//!
//! The save path shared by companies, counterparties and warehouses.

pub mod draft;
pub mod guard;
pub mod service;

pub use draft::{title_case, EntityDraft};
pub use guard::UniquenessGuard;
pub use service::{EntityService, TOP_COUNTRIES};
