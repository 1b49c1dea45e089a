//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::prefetch::PRIORITY_PAGINATION;

/// Maximum accepted endpoint key length in bytes
pub const MAX_ENDPOINT_LENGTH: usize = 512;

/// Request body for POST /__proxy/prefetch
///
/// # Fields
/// - `endpoint`: Endpoint key relative to the data base URL
/// - `priority`: Optional priority (defaults to pagination priority)
#[derive(Debug, Clone, Deserialize)]
pub struct PrefetchRequest {
    /// Endpoint key, e.g. `users/index.json`
    pub endpoint: String,
    /// Scheduling priority, higher runs first
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    PRIORITY_PAGINATION
}

impl PrefetchRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Some("Endpoint cannot be empty".to_string());
        }
        if endpoint.len() > MAX_ENDPOINT_LENGTH {
            return Some(format!(
                "Endpoint exceeds maximum length of {} characters",
                MAX_ENDPOINT_LENGTH
            ));
        }
        if endpoint.contains("://") || endpoint.split('/').any(|seg| seg == "..") {
            return Some("Endpoint must be a relative path".to_string());
        }
        None
    }
}

/// Request body for POST /__proxy/hover
#[derive(Debug, Clone, Deserialize)]
pub struct HoverRequest {
    /// User whose profile link the pointer entered
    pub user_id: u64,
}

/// Request body for POST /__proxy/next-page
#[derive(Debug, Clone, Deserialize)]
pub struct NextPageRequest {
    /// Page currently displayed; the one after it is prefetched
    pub current_page: u32,
}
