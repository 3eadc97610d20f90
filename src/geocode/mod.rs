//! Geocode Provider Adapter
//!
//! HTTP access to the external place directory:
//! - **endpoints**: URL construction for the three directory queries
//! - **client**: request execution and failure classification
//! - **records**: partial decoding of raw records into suggestions

pub mod client;
pub mod endpoints;
pub mod records;

pub use client::{GeocodeClient, GeocodeCounters, GeocodeCountersSnapshot};
pub use endpoints::GeocodeEndpoints;
pub use records::decode;
