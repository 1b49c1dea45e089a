//! Interception Proxy Module
//!
//! Decides per request whether to answer from the durable store, the
//! network, or a degraded fallback.
//!
//! # Strategies
//! - Data resources: network-first with a TTL short-circuit
//! - Documents: network-first with landing page fallback
//! - Static assets: cache-first
//! - Non-GET: forwarded to the origin, never cached
//! - Cross-origin: refused, never forwarded

pub mod classify;
pub mod fetcher;
mod interceptor;
mod lifecycle;
mod stats;

pub use classify::{classify, ClassifyRules, Destination, InterceptedRequest, Strategy};
pub use fetcher::{Fetcher, HttpFetcher, ScriptedFetcher, UpstreamRequest};
pub use interceptor::{InstallReport, Proxy, ProxySettings};
pub use lifecycle::ProxyState;
pub use stats::ProxyStats;
