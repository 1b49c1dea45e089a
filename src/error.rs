//! Error types for the offline proxy
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Fetch Error ==
/// Transport-level failure reported by the network collaborator.
///
/// An HTTP response with any status is not a `FetchError`; only failures to
/// obtain a response at all are.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection refused, DNS or TLS failure, reset mid-body
    #[error("Network error: {0}")]
    Transport(String),

    /// Upstream did not answer within the configured timeout
    #[error("Network timeout: {0}")]
    Timeout(String),

    /// The request could not be turned into an upstream URL
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
}

// == Client Error ==
/// Errors surfaced by the data-access client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No response could be obtained
    #[error("Network error: {0}")]
    Transport(#[from] FetchError),

    /// Response arrived with a non-2xx status
    #[error("HTTP error {status} for {endpoint}")]
    Http { status: u16, endpoint: String },

    /// Payload was not valid JSON
    #[error("Parse error for {endpoint}: {message}")]
    Parse { endpoint: String, message: String },
}

/// Coarse error classes used by presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    RateLimited,
    Server,
    Network,
    Validation,
}

impl ClientError {
    /// Status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classifies the error for display.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClientError::Transport(_) => ErrorCategory::Network,
            ClientError::Parse { .. } => ErrorCategory::Validation,
            ClientError::Http { status, .. } => match *status {
                404 => ErrorCategory::NotFound,
                429 => ErrorCategory::RateLimited,
                // Synthetic offline answers are 503s as well
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Validation,
            },
        }
    }
}

// == Proxy Error ==
/// Unified error type for the proxy server and its lifecycle.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Shell precaching failed; the new generation was not committed
    #[error("Install failed: {0}")]
    Install(String),

    /// Activation attempted in the wrong lifecycle state
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Snapshot could not be read or written
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Snapshot(err.to_string())
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::Snapshot(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ProxyError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ProxyError::Lifecycle(msg) => (StatusCode::CONFLICT, msg.clone()),
            ProxyError::Install(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ProxyError::Snapshot(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(ErrorResponse::new(message));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the proxy.
pub type Result<T> = std::result::Result<T, ProxyError>;
