//! Network Fetcher Module
//!
//! The network collaborator the proxy and the data-access client are built on.
//! `HttpFetcher` talks to a real origin; `ScriptedFetcher` is an in-memory
//! origin with a call counter and an offline switch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use tracing::debug;

use crate::error::FetchError;
use crate::store::CachedResponse;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Checks whether a header must be dropped when crossing the proxy.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

// == Upstream Request ==
/// A request as it is sent to the network.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Absolute URL
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl UpstreamRequest {
    /// Creates a bodiless GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

// == Fetcher Trait ==
/// Performs one network round-trip.
///
/// An `Ok` carries whatever status the origin answered with; `Err` means no
/// response was obtained at all.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: UpstreamRequest) -> Result<CachedResponse, FetchError>;
}

// == HTTP Fetcher ==
/// Fetcher backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Transport(format!("client setup failed: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: UpstreamRequest) -> Result<CachedResponse, FetchError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        let mut builder = self.client.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(classify_reqwest_error)?;

        debug!("{} {} -> {}", request.method, request.url, status);
        Ok(CachedResponse::new(status, headers, body.to_vec()))
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else {
        FetchError::Transport(err.to_string())
    }
}

// == Scripted Fetcher ==
/// In-memory origin keyed by absolute URL.
///
/// Unknown URLs answer 404. While offline every call fails with a transport
/// error. Every call, successful or not, is counted.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, CachedResponse>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the response for `url`, replacing any previous one.
    pub fn route(&self, url: impl Into<String>, response: CachedResponse) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.into(), response);
        }
    }

    /// Switches the simulated network on or off.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetches attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs fetched so far, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: UpstreamRequest) -> Result<CachedResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(request.url.clone());
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Transport(format!(
                "{} unreachable (offline)",
                request.url
            )));
        }

        let routed = self
            .routes
            .lock()
            .ok()
            .and_then(|routes| routes.get(&request.url).cloned());
        Ok(routed.unwrap_or_else(|| CachedResponse::text(404, "Not Found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_hop_by_hop_is_case_insensitive() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(!is_hop_by_hop("content-type"));
    }

    #[tokio::test]
    async fn test_scripted_fetcher_routes_and_counts() {
        let fetcher = ScriptedFetcher::new();
        fetcher.route("http://o/a", CachedResponse::text(200, "a"));

        let hit = assert_ok!(fetcher.fetch(UpstreamRequest::get("http://o/a")).await);
        assert_eq!(hit.body, b"a");

        let miss = assert_ok!(fetcher.fetch(UpstreamRequest::get("http://o/b")).await);
        assert_eq!(miss.status, 404);

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(fetcher.requested(), vec!["http://o/a", "http://o/b"]);
    }

    #[tokio::test]
    async fn test_scripted_fetcher_offline() {
        let fetcher = ScriptedFetcher::new();
        fetcher.route("http://o/a", CachedResponse::text(200, "a"));
        fetcher.set_offline(true);

        let err = assert_err!(fetcher.fetch(UpstreamRequest::get("http://o/a")).await);
        assert!(matches!(err, FetchError::Transport(_)));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_http_fetcher_rejects_invalid_url() {
        let fetcher = HttpFetcher::new(Duration::from_millis(200)).unwrap();
        let err = assert_err!(fetcher.fetch(UpstreamRequest::get("not a url")).await);
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
