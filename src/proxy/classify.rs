//! Request Classification
//!
//! Turns an incoming request into an `InterceptedRequest` and decides which
//! caching strategy applies. `classify` is pure: no store, no network.

use axum::http::{HeaderMap, Method, Uri};
use url::Url;

use crate::proxy::fetcher::{is_hop_by_hop, UpstreamRequest};

// == Destination ==
/// What the requester intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// A navigable page
    Document,
    Script,
    Style,
    Image,
    Font,
    /// Programmatic fetch (XHR, fetch API)
    Empty,
    Other,
}

impl Destination {
    /// Reads the destination from request headers.
    ///
    /// `Sec-Fetch-Dest` wins; without it, a navigation mode or an `Accept`
    /// header listing `text/html` marks a document.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_ascii_lowercase)
        };

        if let Some(dest) = header("sec-fetch-dest") {
            return match dest.as_str() {
                "document" | "iframe" | "frame" => Destination::Document,
                "script" | "worker" | "sharedworker" | "serviceworker" => Destination::Script,
                "style" => Destination::Style,
                "image" => Destination::Image,
                "font" => Destination::Font,
                "empty" => Destination::Empty,
                _ => Destination::Other,
            };
        }

        if header("sec-fetch-mode").as_deref() == Some("navigate") {
            return Destination::Document;
        }

        match header("accept") {
            Some(accept) if accept.contains("text/html") => Destination::Document,
            _ => Destination::Empty,
        }
    }
}

// == Intercepted Request ==
/// A request resolved against the origin it targets.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    /// Absolute target URL, fragment removed
    pub url: Url,
    pub destination: Destination,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl InterceptedRequest {
    /// Resolves `uri` against `origin`.
    ///
    /// Origin-form URIs (`/path?q`) land on `origin`; absolute-form URIs keep
    /// their own host and may therefore be cross-origin.
    pub fn from_parts(
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Vec<u8>,
        origin: &Url,
    ) -> Result<Self, url::ParseError> {
        let mut url = if uri.scheme().is_some() {
            Url::parse(&uri.to_string())?
        } else {
            let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
            origin.join(path)?
        };
        url.set_fragment(None);

        let forwarded = headers
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Ok(Self {
            method,
            url,
            destination: Destination::from_headers(headers),
            headers: forwarded,
            body,
        })
    }

    /// A bodiless GET for `url`.
    pub fn get(url: Url, destination: Destination) -> Self {
        Self {
            method: Method::GET,
            url,
            destination,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Durable cache identity.
    pub fn cache_key(&self) -> String {
        self.url.as_str().to_string()
    }

    /// The same request, ready for the network.
    pub fn to_upstream(&self) -> UpstreamRequest {
        UpstreamRequest {
            method: self.method.clone(),
            url: self.cache_key(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

// == Strategy ==
/// How a request is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Forwarded untouched, never cached
    Bypass,
    /// Data resources: fresh cache, then network, then stale cache
    NetworkFirstWithTtl,
    /// Documents: network, then cache, then landing page
    NetworkFirst,
    /// Static assets: cache, then network
    CacheFirst,
}

/// Inputs to classification.
#[derive(Debug, Clone)]
pub struct ClassifyRules {
    /// Origin the proxy fronts
    pub origin: Url,
    /// Path prefix of data resources, e.g. `/data/`
    pub data_prefix: String,
}

impl ClassifyRules {
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    pub fn is_data_path(&self, url: &Url) -> bool {
        url.path().starts_with(&self.data_prefix)
    }
}

// == Classify ==
/// Picks the strategy for `request`.
pub fn classify(request: &InterceptedRequest, rules: &ClassifyRules) -> Strategy {
    if request.method != Method::GET || !rules.is_same_origin(&request.url) {
        return Strategy::Bypass;
    }

    if rules.is_data_path(&request.url) {
        Strategy::NetworkFirstWithTtl
    } else if request.destination == Destination::Document {
        Strategy::NetworkFirst
    } else {
        Strategy::CacheFirst
    }
}
