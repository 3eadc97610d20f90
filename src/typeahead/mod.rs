//! Typeahead Queries
//!
//! Country, division and city lookups backed by the tiered cache. Every
//! query answers with a possibly empty list and never fails.

pub mod filter;
pub mod resolver;

pub use filter::filter_and_sort;
pub use resolver::TypeaheadResolver;
