//! Cache-or-compute lookup for entities.
//!
//! A single concurrent map keyed by entity identity. Entries expire a fixed
//! time after insertion. Write paths do not invalidate entries, so a cached
//! snapshot can trail the store for up to one TTL.
//!
//! ```toml
//! [cache]
//! ttl_seconds = 180
//! ```

mod config;
mod store;

pub use config::CacheConfig;
pub use store::EntityCache;
