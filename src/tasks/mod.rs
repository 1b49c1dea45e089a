//! Background Tasks Module
//!
//! Contains background tasks that run periodically during proxy operation.
//!
//! # Tasks
//! - Snapshot: Persists the durable store at configured intervals

mod snapshot;

pub use snapshot::{load_snapshot, persist_snapshot, spawn_snapshot_task};
