//! Offline Proxy - caching and prefetch core for a static data viewer
//!
//! An intercepting proxy with a generation-scoped durable store, an
//! in-memory freshness cache for the data client, and a bounded
//! priority prefetch scheduler.

pub mod api;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod prefetch;
pub mod proxy;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use tasks::spawn_snapshot_task;
