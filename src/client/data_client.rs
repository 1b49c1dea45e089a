//! Data-Access Client
//!
//! Fetches JSON endpoints relative to a base URL and keeps parsed payloads in
//! a `FreshnessCache` for the configured TTL.

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::client::endpoints;
use crate::client::FreshnessCache;
use crate::clock::SharedClock;
use crate::config::Config;
use crate::error::ClientError;
use crate::proxy::{Fetcher, UpstreamRequest};

// == Data Client ==
pub struct DataClient {
    base_url: String,
    enable_cache: bool,
    fetcher: Arc<dyn Fetcher>,
    clock: SharedClock,
    cache: RwLock<FreshnessCache>,
}

impl DataClient {
    // == Constructor ==
    pub fn new(
        base_url: impl Into<String>,
        ttl_ms: u64,
        enable_cache: bool,
        fetcher: Arc<dyn Fetcher>,
        clock: SharedClock,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            enable_cache,
            fetcher,
            clock,
            cache: RwLock::new(FreshnessCache::new(ttl_ms)),
        }
    }

    /// Creates a client from configuration.
    pub fn from_config(config: &Config, fetcher: Arc<dyn Fetcher>, clock: SharedClock) -> Self {
        Self::new(
            config.base_url.clone(),
            config.cache_duration_ms,
            config.enable_cache,
            fetcher,
            clock,
        )
    }

    /// Absolute URL for an endpoint key.
    pub fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    // == Fetch ==
    /// Returns the payload for `endpoint`, from memory when still fresh.
    ///
    /// No retries: a transport failure, a non-2xx status or an unparseable
    /// body is returned to the caller as is, and nothing is cached.
    pub async fn fetch(&self, endpoint: &str) -> Result<Value, ClientError> {
        if self.enable_cache {
            let now = self.clock.now_ms();
            let cached = self
                .cache
                .read()
                .ok()
                .and_then(|cache| cache.get(endpoint, now).cloned());
            if let Some(value) = cached {
                debug!("Freshness cache hit for {}", endpoint);
                return Ok(value);
            }
        }

        let url = self.url_for(endpoint);
        let response = self.fetcher.fetch(UpstreamRequest::get(url)).await?;

        if !response.is_success() {
            return Err(ClientError::Http {
                status: response.status,
                endpoint: endpoint.to_string(),
            });
        }

        let value: Value =
            serde_json::from_slice(&response.body).map_err(|e| ClientError::Parse {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        if self.enable_cache {
            let now = self.clock.now_ms();
            if let Ok(mut cache) = self.cache.write() {
                let purged = cache.purge_expired(now);
                if purged > 0 {
                    debug!("Dropped {} expired payloads", purged);
                }
                cache.insert(endpoint, value.clone(), now);
            }
        }

        Ok(value)
    }

    /// True when `endpoint` would be answered from memory right now.
    pub fn is_cached(&self, endpoint: &str) -> bool {
        self.enable_cache
            && self
                .cache
                .read()
                .map(|cache| cache.is_valid(endpoint, self.clock.now_ms()))
                .unwrap_or(false)
    }

    /// Drops every cached payload.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    /// Number of cached payloads, expired or not.
    pub fn cached_entries(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Overrides the stored timestamp of a cached payload.
    pub fn set_cached_at(&self, endpoint: &str, inserted_at: u64) -> bool {
        self.cache
            .write()
            .map(|mut c| c.set_inserted_at(endpoint, inserted_at))
            .unwrap_or(false)
    }

    // == Accessors ==
    pub async fn metadata(&self) -> Result<Value, ClientError> {
        self.fetch(endpoints::METADATA).await
    }

    pub async fn user_index(&self) -> Result<Value, ClientError> {
        self.fetch(endpoints::USER_INDEX).await
    }

    pub async fn country_index(&self) -> Result<Value, ClientError> {
        self.fetch(endpoints::COUNTRY_INDEX).await
    }

    pub async fn user(&self, id: u64) -> Result<Value, ClientError> {
        self.fetch(&endpoints::user_path(id)).await
    }

    pub async fn country(&self, code: &str) -> Result<Value, ClientError> {
        self.fetch(&endpoints::country(code)).await
    }

    pub async fn user_page(&self, page: u32) -> Result<Value, ClientError> {
        self.fetch(&endpoints::user_page(page)).await
    }
}
