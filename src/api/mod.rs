//! API Module
//!
//! REST endpoints for typeahead lookups, entity saves and aggregates.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
