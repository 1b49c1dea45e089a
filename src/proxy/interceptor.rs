//! Interception Proxy
//!
//! Satisfies every intercepted request from the durable store, the network,
//! or a synthetic fallback, according to its strategy. `handle` never fails.

use std::sync::{Arc, Mutex, RwLock as StdRwLock};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::clock::SharedClock;
use crate::config::Config;
use crate::error::{FetchError, ProxyError, Result};
use crate::proxy::classify::{classify, ClassifyRules, Destination, InterceptedRequest, Strategy};
use crate::proxy::fetcher::{Fetcher, UpstreamRequest};
use crate::proxy::lifecycle::{Lifecycle, ProxyState};
use crate::proxy::stats::ProxyStats;
use crate::store::{with_timestamp, CachedResponse, MissingTimestampPolicy, SharedStore};

// == Proxy Settings ==
/// Everything the proxy needs to know about the site it fronts.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub origin: Url,
    pub generation: String,
    pub data_prefix: String,
    pub landing_page: String,
    pub shell_pages: Vec<String>,
    pub warm_endpoints: Vec<String>,
    pub ttl_ms: u64,
    pub missing_timestamp_policy: MissingTimestampPolicy,
}

impl ProxySettings {
    /// Builds settings from configuration, validating the origin URL.
    pub fn from_config(config: &Config) -> Result<Self> {
        let origin = Url::parse(&config.origin_url).map_err(|e| {
            ProxyError::InvalidRequest(format!("ORIGIN_URL {}: {}", config.origin_url, e))
        })?;

        Ok(Self {
            origin,
            generation: config.generation.clone(),
            data_prefix: config.data_prefix.clone(),
            landing_page: config.landing_page.clone(),
            shell_pages: config.shell_pages.clone(),
            warm_endpoints: config.warm_endpoints.clone(),
            ttl_ms: config.cache_duration_ms,
            missing_timestamp_policy: config.missing_timestamp_policy,
        })
    }

    fn rules(&self) -> ClassifyRules {
        ClassifyRules {
            origin: self.origin.clone(),
            data_prefix: self.data_prefix.clone(),
        }
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        self.origin
            .join(path)
            .map_err(|e| ProxyError::InvalidRequest(format!("{}: {}", path, e)))
    }
}

// == Install Report ==
/// Outcome of an install pass.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub shell_cached: usize,
    pub warmed: usize,
    pub warm_failures: usize,
}

// == Proxy ==
pub struct Proxy {
    settings: ProxySettings,
    rules: ClassifyRules,
    store: SharedStore,
    fetcher: Arc<dyn Fetcher>,
    clock: SharedClock,
    lifecycle: Lifecycle,
    /// Generation reads and writes go to; differs from the configured one
    /// only when install failed and an older generation is being served
    live_generation: StdRwLock<String>,
    stats: Mutex<ProxyStats>,
}

impl Proxy {
    // == Constructor ==
    pub fn new(
        settings: ProxySettings,
        store: SharedStore,
        fetcher: Arc<dyn Fetcher>,
        clock: SharedClock,
    ) -> Self {
        Self {
            rules: settings.rules(),
            live_generation: StdRwLock::new(settings.generation.clone()),
            settings,
            store,
            fetcher,
            clock,
            lifecycle: Lifecycle::new(),
            stats: Mutex::new(ProxyStats::new()),
        }
    }

    // == Accessors ==
    pub fn state(&self) -> ProxyState {
        self.lifecycle.state()
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    /// Shared handle to the durable store.
    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    /// Generation currently served.
    pub fn generation(&self) -> String {
        self.live_generation
            .read()
            .map(|g| g.clone())
            .unwrap_or_else(|_| self.settings.generation.clone())
    }

    pub fn stats(&self) -> ProxyStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, update: impl FnOnce(&mut ProxyStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            update(&mut stats);
        }
    }

    fn set_live(&self, generation: String) {
        if let Ok(mut live) = self.live_generation.write() {
            *live = generation;
        }
    }

    // == Install ==
    /// Precaches the shell pages, then warms the data endpoints.
    ///
    /// Shell pages are all-or-nothing: any failure aborts the install and
    /// nothing is written. Warm-up failures are logged and counted only.
    pub async fn install(&self) -> Result<InstallReport> {
        let generation = self.settings.generation.clone();
        info!("Installing cache generation {}", generation);

        let now = self.clock.now_ms();
        let mut staged = Vec::with_capacity(self.settings.shell_pages.len());
        for page in &self.settings.shell_pages {
            let url = self.settings.resolve(page)?;
            let response = self
                .fetcher
                .fetch(UpstreamRequest::get(url.as_str()))
                .await
                .map_err(|e| ProxyError::Install(format!("{}: {}", page, e)))?;

            if response.status != 200 {
                return Err(ProxyError::Install(format!(
                    "{} answered {}",
                    page, response.status
                )));
            }
            staged.push((url.to_string(), with_timestamp(&response, now)));
        }

        let shell_cached = staged.len();
        self.store.write().await.commit(&generation, staged)?;
        self.lifecycle.mark_installed();
        info!("Precached {} shell pages", shell_cached);

        let mut warmed = 0;
        let mut warm_failures = 0;
        for endpoint in &self.settings.warm_endpoints {
            match self.warm(&generation, endpoint).await {
                Ok(()) => warmed += 1,
                Err(reason) => {
                    warn!("Warm-up of {} skipped: {}", endpoint, reason);
                    warm_failures += 1;
                }
            }
        }

        Ok(InstallReport {
            generation,
            shell_cached,
            warmed,
            warm_failures,
        })
    }

    async fn warm(&self, generation: &str, endpoint: &str) -> std::result::Result<(), String> {
        let url = self.settings.resolve(endpoint).map_err(|e| e.to_string())?;
        let response = self
            .fetcher
            .fetch(UpstreamRequest::get(url.as_str()))
            .await
            .map_err(|e| e.to_string())?;

        if !response.is_success() {
            return Err(format!("status {}", response.status));
        }

        let stamped = with_timestamp(&response, self.clock.now_ms());
        self.store
            .write()
            .await
            .put(generation, url.as_str(), stamped)
            .map_err(|e| e.to_string())
    }

    // == Activate ==
    /// Deletes every other generation and takes control of requests.
    ///
    /// Returns the purged generation tags.
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.lifecycle.begin_activation()?;

        let generation = self.settings.generation.clone();
        let purged = self.store.write().await.retain_only(&generation);
        for name in &purged {
            info!("Deleted stale cache generation {}", name);
        }

        self.set_live(generation.clone());
        self.lifecycle.take_control();
        info!("Generation {} active, intercepting requests", generation);
        Ok(purged)
    }

    // == Degraded Start ==
    /// Takes control without a completed install.
    ///
    /// Serves a previously persisted generation if one holds entries, leaving
    /// it and every other generation in place. Returns the generation served.
    pub async fn serve_degraded(&self) -> String {
        let current = &self.settings.generation;
        let previous = self.store.read().await.latest_generation_except(current);

        let served = match previous {
            Some(name) => {
                warn!("Install incomplete, serving previous generation {}", name);
                name
            }
            None => {
                warn!("Install incomplete and no previous generation, serving {}", current);
                current.clone()
            }
        };

        self.set_live(served.clone());
        self.lifecycle.take_control();
        served
    }

    // == Handle ==
    /// Answers one request. Never fails.
    pub async fn handle(&self, request: InterceptedRequest) -> CachedResponse {
        if !self.lifecycle.is_controlling() {
            return self.passthrough(&request).await;
        }

        let _guard = self.lifecycle.enter();
        let strategy = classify(&request, &self.rules);
        debug!("{} {} -> {:?}", request.method, request.url, strategy);

        match strategy {
            Strategy::Bypass => self.passthrough(&request).await,
            Strategy::NetworkFirstWithTtl => self.network_first_with_ttl(&request).await,
            Strategy::NetworkFirst => self.network_first(&request).await,
            Strategy::CacheFirst => self.cache_first(&request).await,
        }
    }

    async fn passthrough(&self, request: &InterceptedRequest) -> CachedResponse {
        self.record(ProxyStats::record_bypass);
        if !self.rules.is_same_origin(&request.url) {
            warn!("Refusing to forward {} outside {}", request.url, self.settings.origin);
            return self.offline();
        }
        match self.network(request).await {
            Ok(response) => response,
            Err(_) => self.offline(),
        }
    }

    // == Strategies ==
    async fn network_first_with_ttl(&self, request: &InterceptedRequest) -> CachedResponse {
        let key = request.cache_key();
        let cached = self.cached(&key).await;

        if let Some(entry) = &cached {
            let now = self.clock.now_ms();
            if entry.is_fresh(now, self.settings.ttl_ms, self.settings.missing_timestamp_policy) {
                self.record(ProxyStats::record_hit);
                return entry.clone();
            }
        }
        self.record(ProxyStats::record_miss);

        match self.network(request).await {
            Ok(response) if response.is_success() => {
                let stamped = with_timestamp(&response, self.clock.now_ms());
                self.persist(&key, stamped.clone()).await;
                stamped
            }
            Ok(response) => response,
            Err(_) => match cached {
                Some(stale) => {
                    debug!("Serving stale {}", key);
                    self.record(ProxyStats::record_fallback);
                    stale
                }
                None => self.offline(),
            },
        }
    }

    async fn network_first(&self, request: &InterceptedRequest) -> CachedResponse {
        let key = request.cache_key();

        match self.network(request).await {
            Ok(response) => {
                if response.status == 200 {
                    let stamped = with_timestamp(&response, self.clock.now_ms());
                    self.persist(&key, stamped).await;
                }
                response
            }
            Err(_) => {
                if let Some(entry) = self.cached(&key).await {
                    self.record(ProxyStats::record_fallback);
                    return entry;
                }
                self.landing_page_or_offline().await
            }
        }
    }

    async fn cache_first(&self, request: &InterceptedRequest) -> CachedResponse {
        let key = request.cache_key();

        if let Some(entry) = self.cached(&key).await {
            self.record(ProxyStats::record_hit);
            return entry;
        }
        self.record(ProxyStats::record_miss);

        match self.network(request).await {
            Ok(response) => {
                if response.status == 200 {
                    let stamped = with_timestamp(&response, self.clock.now_ms());
                    self.persist(&key, stamped).await;
                }
                response
            }
            Err(_) if request.destination == Destination::Document => {
                self.landing_page_or_offline().await
            }
            Err(_) => self.offline(),
        }
    }

    // == Helpers ==
    async fn landing_page_or_offline(&self) -> CachedResponse {
        let landing = match self.settings.resolve(&self.settings.landing_page) {
            Ok(url) => self.cached(url.as_str()).await,
            Err(_) => None,
        };

        match landing {
            Some(page) => {
                self.record(ProxyStats::record_fallback);
                page
            }
            None => self.offline(),
        }
    }

    async fn network(
        &self,
        request: &InterceptedRequest,
    ) -> std::result::Result<CachedResponse, FetchError> {
        self.record(ProxyStats::record_fetch);
        let result = self.fetcher.fetch(request.to_upstream()).await;
        if let Err(e) = &result {
            debug!("Network failed for {}: {}", request.url, e);
            self.record(ProxyStats::record_network_failure);
        }
        result
    }

    async fn cached(&self, key: &str) -> Option<CachedResponse> {
        let generation = self.generation();
        self.store.write().await.lookup(&generation, key)
    }

    async fn persist(&self, key: &str, response: CachedResponse) {
        let generation = self.generation();
        if let Err(e) = self.store.write().await.put(&generation, key, response) {
            warn!("Could not cache {}: {}", key, e);
        }
    }

    fn offline(&self) -> CachedResponse {
        self.record(ProxyStats::record_offline);
        CachedResponse::offline()
    }
}

// == Fetcher Implementation ==
/// Lets in-process clients route their requests through the proxy.
#[async_trait]
impl Fetcher for Proxy {
    async fn fetch(
        &self,
        request: UpstreamRequest,
    ) -> std::result::Result<CachedResponse, FetchError> {
        let mut url = Url::parse(&request.url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", request.url, e)))?;
        url.set_fragment(None);

        let intercepted = InterceptedRequest {
            method: request.method,
            url,
            destination: Destination::Empty,
            headers: request.headers,
            body: request.body,
        };
        Ok(self.handle(intercepted).await)
    }
}
