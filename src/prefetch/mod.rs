//! Prefetch Module
//!
//! Priority-ordered, concurrency-bounded speculative fetching.
//!
//! # Triggers
//! - Startup: fixed high-priority data endpoints
//! - Hover intent: profile data after a settle delay, cancellable
//! - Pagination: the next page at medium priority

mod queue;
mod scheduler;
mod triggers;

pub use queue::PrefetchQueue;
pub use scheduler::{
    PrefetchFuture, PrefetchOutcome, PrefetchScheduler, SchedulerStats, TaskHandle,
};
pub use triggers::{
    HoverIntent, Prefetcher, PRIORITY_HOVER, PRIORITY_PAGINATION, PRIORITY_STARTUP,
};
