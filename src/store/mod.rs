//! Durable Store Module
//!
//! Generation-scoped response cache owned by the interception proxy.

mod durable;
mod entry;
mod lru;

#[cfg(test)]
mod property_tests;

use std::sync::Arc;

use tokio::sync::RwLock;

// Re-export public types
pub use entry::{
    with_timestamp, CachedResponse, MissingTimestampPolicy, CACHED_AT_HEADER, OFFLINE_BODY,
};
pub use durable::{DurableStore, DEFAULT_MAX_ENTRIES};

/// Durable store shared between the proxy and background tasks.
pub type SharedStore = Arc<RwLock<DurableStore>>;

/// Wraps a store for sharing.
pub fn shared(store: DurableStore) -> SharedStore {
    Arc::new(RwLock::new(store))
}
