//! API Module
//!
//! HTTP handlers and routing for the offline proxy.
//!
//! # Endpoints
//! - `GET /__proxy/health` - Health check endpoint
//! - `GET /__proxy/stats` - Proxy and prefetch statistics
//! - `POST /__proxy/prefetch` - Queue a prefetch for a data endpoint
//! - `POST /__proxy/next-page` - Prefetch the page after the current one
//! - `POST`/`DELETE /__proxy/hover` - Debounced profile prefetch
//! - `DELETE /__proxy/client-cache` - Clear the freshness cache
//! - everything else - intercepted by the proxy

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
