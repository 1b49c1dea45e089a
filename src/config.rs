//! Configuration Module
//!
//! Handles loading and managing proxy configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::store::{MissingTimestampPolicy, DEFAULT_MAX_ENTRIES};

/// Default freshness window shared by both cache layers (15 minutes).
pub const DEFAULT_CACHE_DURATION_MS: u64 = 900_000;

/// Default number of prefetch tasks allowed in flight.
pub const DEFAULT_PREFETCH_CONCURRENCY: usize = 3;

/// Proxy configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream origin every intercepted request is forwarded to
    pub origin_url: String,
    /// Base URL the data-access client prefixes endpoint keys with
    pub base_url: String,
    /// TTL in milliseconds for data responses and the freshness cache
    pub cache_duration_ms: u64,
    /// Gate for the in-memory freshness cache
    pub enable_cache: bool,
    /// Name of the live durable cache generation
    pub generation: String,
    /// Path prefix identifying data resources
    pub data_prefix: String,
    /// Page served when a document is unavailable
    pub landing_page: String,
    /// Pages precached at install time
    pub shell_pages: Vec<String>,
    /// Data paths warmed best-effort at install time
    pub warm_endpoints: Vec<String>,
    /// How cached data without a timestamp header is treated
    pub missing_timestamp_policy: MissingTimestampPolicy,
    /// Runtime-cached entries kept per generation before LRU eviction
    pub max_cache_entries: usize,
    /// Prefetch concurrency ceiling
    pub prefetch_concurrency: usize,
    /// Hover-intent settle delay in milliseconds
    pub hover_settle_ms: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Where the durable store is persisted, if anywhere
    pub snapshot_path: Option<PathBuf>,
    /// Interval in seconds between snapshot writes
    pub snapshot_interval: u64,
    /// Upstream request timeout in milliseconds
    pub upstream_timeout_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `ORIGIN_URL` - Upstream origin (default: http://127.0.0.1:8080)
    /// - `BASE_URL` - Data client base URL (default: origin joined with the data prefix)
    /// - `CACHE_DURATION` - TTL in milliseconds (default: 900000)
    /// - `ENABLE_CACHE` - Freshness cache on/off (default: true)
    /// - `CACHE_GENERATION` - Durable generation tag (default: offline-proxy-v1)
    /// - `DATA_PREFIX` - Data path prefix (default: /data/)
    /// - `LANDING_PAGE` - Offline landing page (default: /index.html)
    /// - `SHELL_PAGES` - Comma separated shell pages (default: /,/index.html)
    /// - `WARM_ENDPOINTS` - Comma separated data paths warmed at install
    /// - `MISSING_TIMESTAMP_POLICY` - `fresh` or `stale` (default: fresh)
    /// - `MAX_CACHE_ENTRIES` - Evictable entries per generation (default: 500)
    /// - `PREFETCH_CONCURRENCY` - Prefetch ceiling (default: 3)
    /// - `HOVER_SETTLE_MS` - Hover settle delay (default: 150)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SNAPSHOT_PATH` - Durable store snapshot file (default: unset)
    /// - `SNAPSHOT_INTERVAL` - Snapshot frequency in seconds (default: 30)
    /// - `UPSTREAM_TIMEOUT_MS` - Upstream timeout (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let origin_url = env::var("ORIGIN_URL").unwrap_or(defaults.origin_url);
        let data_prefix = env::var("DATA_PREFIX").unwrap_or(defaults.data_prefix);
        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| derive_base_url(&origin_url, &data_prefix));

        Self {
            origin_url,
            base_url,
            cache_duration_ms: parse_env("CACHE_DURATION", defaults.cache_duration_ms),
            enable_cache: parse_env("ENABLE_CACHE", defaults.enable_cache),
            generation: env::var("CACHE_GENERATION").unwrap_or(defaults.generation),
            data_prefix,
            landing_page: env::var("LANDING_PAGE").unwrap_or(defaults.landing_page),
            shell_pages: parse_list("SHELL_PAGES").unwrap_or(defaults.shell_pages),
            warm_endpoints: parse_list("WARM_ENDPOINTS").unwrap_or(defaults.warm_endpoints),
            missing_timestamp_policy: parse_env(
                "MISSING_TIMESTAMP_POLICY",
                defaults.missing_timestamp_policy,
            ),
            max_cache_entries: parse_env("MAX_CACHE_ENTRIES", defaults.max_cache_entries).max(1),
            prefetch_concurrency: parse_env("PREFETCH_CONCURRENCY", defaults.prefetch_concurrency)
                .max(1),
            hover_settle_ms: parse_env("HOVER_SETTLE_MS", defaults.hover_settle_ms),
            server_port: parse_env("SERVER_PORT", defaults.server_port),
            snapshot_path: env::var("SNAPSHOT_PATH").ok().map(PathBuf::from),
            snapshot_interval: parse_env("SNAPSHOT_INTERVAL", defaults.snapshot_interval),
            upstream_timeout_ms: parse_env("UPSTREAM_TIMEOUT_MS", defaults.upstream_timeout_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin_url: "http://127.0.0.1:8080".to_string(),
            base_url: "http://127.0.0.1:8080/data".to_string(),
            cache_duration_ms: DEFAULT_CACHE_DURATION_MS,
            enable_cache: true,
            generation: "offline-proxy-v1".to_string(),
            data_prefix: "/data/".to_string(),
            landing_page: "/index.html".to_string(),
            shell_pages: vec!["/".to_string(), "/index.html".to_string()],
            warm_endpoints: vec![
                "/data/metadata.json".to_string(),
                "/data/users/index.json".to_string(),
                "/data/countries/index.json".to_string(),
            ],
            missing_timestamp_policy: MissingTimestampPolicy::default(),
            max_cache_entries: DEFAULT_MAX_ENTRIES,
            prefetch_concurrency: DEFAULT_PREFETCH_CONCURRENCY,
            hover_settle_ms: 150,
            server_port: 3000,
            snapshot_path: None,
            snapshot_interval: 30,
            upstream_timeout_ms: 10_000,
        }
    }
}

/// Joins the origin and data prefix into the client's base URL.
fn derive_base_url(origin_url: &str, data_prefix: &str) -> String {
    format!(
        "{}/{}",
        origin_url.trim_end_matches('/'),
        data_prefix.trim_matches('/')
    )
}

fn parse_env<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_list(name: &str) -> Option<Vec<String>> {
    let raw = env::var(name).ok()?;
    Some(
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    )
}
