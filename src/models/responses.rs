//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::prefetch::SchedulerStats;
use crate::proxy::{ProxyState, ProxyStats};

/// Response body for POST /__proxy/prefetch
#[derive(Debug, Clone, Serialize)]
pub struct PrefetchResponse {
    /// The endpoint that was requested
    pub endpoint: String,
    /// False when the endpoint was already fresh and nothing was queued
    pub scheduled: bool,
}

impl PrefetchResponse {
    pub fn new(endpoint: impl Into<String>, scheduled: bool) -> Self {
        Self {
            endpoint: endpoint.into(),
            scheduled,
        }
    }
}

/// Response body for POST and DELETE /__proxy/hover
#[derive(Debug, Clone, Serialize)]
pub struct HoverResponse {
    /// Profile endpoint the pending timer will prefetch, if any
    pub endpoint: Option<String>,
    /// True while the settle timer is counting down
    pub pending: bool,
}

impl HoverResponse {
    pub fn new(endpoint: Option<String>, pending: bool) -> Self {
        Self { endpoint, pending }
    }
}

/// Response body for DELETE /__proxy/client-cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Success message
    pub message: String,
    /// Number of entries removed
    pub cleared: usize,
}

impl ClearResponse {
    pub fn new(cleared: usize) -> Self {
        Self {
            message: format!("Cleared {} cached payloads", cleared),
            cleared,
        }
    }
}

/// Response body for the stats endpoint (GET /__proxy/stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Lifecycle state of the proxy
    pub state: ProxyState,
    /// Generation being served
    pub generation: String,
    /// Entries in the durable store
    pub durable_entries: usize,
    /// Entries in the client freshness cache
    pub client_entries: usize,
    /// Durable cache hit rate
    pub hit_rate: f64,
    /// Request counters
    pub proxy: ProxyStats,
    /// Prefetch counters
    pub prefetch: SchedulerStats,
}

impl StatsResponse {
    pub fn new(
        state: ProxyState,
        generation: String,
        durable_entries: usize,
        client_entries: usize,
        proxy: ProxyStats,
        prefetch: SchedulerStats,
    ) -> Self {
        Self {
            state,
            generation,
            durable_entries,
            client_entries,
            hit_rate: proxy.hit_rate(),
            proxy,
            prefetch,
        }
    }
}

/// Response body for the health endpoint (GET /__proxy/health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Lifecycle state of the proxy
    pub state: ProxyState,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(state: ProxyState) -> Self {
        Self {
            status: "healthy".to_string(),
            state,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
