//! API Handlers
//!
//! The catch-all interception handler plus the admin endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::Response,
    Json,
};

use crate::client::{endpoints, DataClient};
use crate::clock::system_clock;
use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::models::{
    ClearResponse, HealthResponse, HoverRequest, HoverResponse, NextPageRequest, PrefetchRequest,
    PrefetchResponse, StatsResponse,
};
use crate::prefetch::{HoverIntent, PrefetchScheduler, Prefetcher};
use crate::proxy::{fetcher::is_hop_by_hop, InterceptedRequest, Proxy};
use crate::store::CachedResponse;

/// Largest request body forwarded upstream.
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Interception proxy, owner of the durable store
    pub proxy: Arc<Proxy>,
    /// Prefetch triggers over the data-access client
    pub prefetcher: Prefetcher,
    /// Debounced profile prefetch driven by POST/DELETE /__proxy/hover
    pub hover: Arc<HoverIntent>,
}

impl AppState {
    /// Creates a new AppState; hover prefetches wait `hover_settle` first.
    pub fn new(proxy: Arc<Proxy>, prefetcher: Prefetcher, hover_settle: Duration) -> Self {
        let hover = Arc::new(prefetcher.hover_intent(hover_settle));
        Self {
            proxy,
            prefetcher,
            hover,
        }
    }

    /// Wires a data client and scheduler over `proxy` from configuration.
    ///
    /// The client sends its requests through the proxy in-process, so
    /// prefetches populate the durable store as well.
    pub fn from_config(config: &Config, proxy: Arc<Proxy>, scheduler: PrefetchScheduler) -> Self {
        let client = DataClient::from_config(config, proxy.clone(), system_clock());
        let prefetcher = Prefetcher::new(Arc::new(client), scheduler);
        Self::new(
            proxy,
            prefetcher,
            Duration::from_millis(config.hover_settle_ms),
        )
    }
}

/// Converts a cached value into an HTTP response.
pub fn into_http_response(cached: CachedResponse) -> Response {
    let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut response = Response::new(Body::from(cached.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &cached.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    response
}

/// Fallback handler for every non-admin path.
///
/// Only a malformed request or an absolute URI naming another origin is an
/// error; everything else is answered by the proxy, degraded if need be.
pub async fn intercept_handler(State(state): State<AppState>, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ProxyError::InvalidRequest(format!("Request body rejected: {}", e)))?;

    let intercepted = InterceptedRequest::from_parts(
        parts.method,
        &parts.uri,
        &parts.headers,
        body.to_vec(),
        &state.proxy.settings().origin,
    )
    .map_err(|e| ProxyError::InvalidRequest(format!("Unroutable URI {}: {}", parts.uri, e)))?;

    let origin = &state.proxy.settings().origin;
    if intercepted.url.origin() != origin.origin() {
        return Err(ProxyError::InvalidRequest(format!(
            "{} is not served by this proxy",
            intercepted.url
        )));
    }

    let cached = state.proxy.handle(intercepted).await;
    Ok(into_http_response(cached))
}

/// Handler for GET /__proxy/health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.proxy.state()))
}

/// Handler for GET /__proxy/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let durable_entries = state.proxy.store().read().await.total_entries();

    Json(StatsResponse::new(
        state.proxy.state(),
        state.proxy.generation(),
        durable_entries,
        state.prefetcher.client().cached_entries(),
        state.proxy.stats(),
        state.prefetcher.scheduler().stats(),
    ))
}

/// Handler for POST /__proxy/prefetch
///
/// Queues a best-effort fetch; the response does not wait for it.
pub async fn prefetch_handler(
    State(state): State<AppState>,
    Json(req): Json<PrefetchRequest>,
) -> Result<Json<PrefetchResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ProxyError::InvalidRequest(error_msg));
    }

    let endpoint = req.endpoint.trim().to_string();
    let scheduled = state
        .prefetcher
        .prefetch(endpoint.clone(), req.priority)
        .is_some();

    Ok(Json(PrefetchResponse::new(endpoint, scheduled)))
}

/// Handler for POST /__proxy/next-page
///
/// Looks ahead one page from the page the viewer just rendered.
pub async fn next_page_handler(
    State(state): State<AppState>,
    Json(req): Json<NextPageRequest>,
) -> Result<Json<PrefetchResponse>> {
    let next = req.current_page.checked_add(1).ok_or_else(|| {
        ProxyError::InvalidRequest(format!("No page after {}", req.current_page))
    })?;

    let scheduled = state
        .prefetcher
        .prefetch_next_page(req.current_page)
        .is_some();

    Ok(Json(PrefetchResponse::new(endpoints::user_page(next), scheduled)))
}

/// Handler for POST /__proxy/hover
///
/// Starts the settle timer for a profile link; replaces any pending one.
pub async fn hover_enter_handler(
    State(state): State<AppState>,
    Json(req): Json<HoverRequest>,
) -> Json<HoverResponse> {
    state.hover.pointer_enter(req.user_id);

    Json(HoverResponse::new(
        Some(endpoints::user_path(req.user_id)),
        state.hover.is_pending(),
    ))
}

/// Handler for DELETE /__proxy/hover
pub async fn hover_leave_handler(State(state): State<AppState>) -> Json<HoverResponse> {
    state.hover.pointer_leave();

    Json(HoverResponse::new(None, state.hover.is_pending()))
}

/// Handler for DELETE /__proxy/client-cache
pub async fn clear_client_cache_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let client = state.prefetcher.client();
    let cleared = client.cached_entries();
    client.clear_cache();

    Json(ClearResponse::new(cleared))
}
