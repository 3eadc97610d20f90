//! Cache Storage Backends
//!
//! Implementations of the key/value cache port.

mod memory;

pub use memory::MemoryCache;
