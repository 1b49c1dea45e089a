//! Data-Access Client Module
//!
//! JSON endpoint client with an in-memory freshness cache.

mod data_client;
pub mod endpoints;
mod freshness;

pub use data_client::DataClient;
pub use freshness::FreshnessCache;
