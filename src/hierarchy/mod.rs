//! Place Hierarchy
//!
//! Country, division and city records plus the transactional store that
//! holds them next to the business entities.

pub mod engine;
pub mod store;

pub use engine::{HierarchyUpsertEngine, ResolvedSelection};
pub use store::MemoryRecordStore;
