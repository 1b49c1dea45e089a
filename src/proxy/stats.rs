//! Proxy Statistics Module
//!
//! Tracks how intercepted requests were satisfied.

use serde::Serialize;

// == Proxy Stats ==
/// Counters for intercepted requests.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProxyStats {
    /// Requests answered from the durable store without a network call
    pub cache_hits: u64,
    /// Requests that found no usable entry up front
    pub cache_misses: u64,
    /// Network round-trips attempted
    pub network_fetches: u64,
    /// Network round-trips that failed at the transport level
    pub network_failures: u64,
    /// Failures answered with a cached (possibly stale) entry
    pub fallbacks: u64,
    /// Synthetic 503 responses produced
    pub offline_responses: u64,
    /// Requests forwarded without caching
    pub bypassed: u64,
}

impl ProxyStats {
    // == Constructor ==
    /// Creates a new ProxyStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the durable cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.cache_misses += 1;
    }

    pub fn record_fetch(&mut self) {
        self.network_fetches += 1;
    }

    pub fn record_network_failure(&mut self) {
        self.network_failures += 1;
    }

    pub fn record_fallback(&mut self) {
        self.fallbacks += 1;
    }

    pub fn record_offline(&mut self) {
        self.offline_responses += 1;
    }

    pub fn record_bypass(&mut self) {
        self.bypassed += 1;
    }
}
