//! API Routes
//!
//! Configures the Axum router: admin endpoints under `/__proxy`, every other
//! path intercepted.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_client_cache_handler, health_handler, hover_enter_handler, hover_leave_handler,
    intercept_handler, next_page_handler, prefetch_handler, stats_handler, AppState,
};

/// Prefix reserved for the proxy's own endpoints.
pub const ADMIN_PREFIX: &str = "/__proxy";

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /__proxy/health` - Health check endpoint
/// - `GET /__proxy/stats` - Proxy, cache and prefetch counters
/// - `POST /__proxy/prefetch` - Queue a best-effort prefetch
/// - `POST /__proxy/next-page` - Look ahead one page of the user listing
/// - `POST /__proxy/hover` - Pointer entered a profile link
/// - `DELETE /__proxy/hover` - Pointer left before the settle delay
/// - `DELETE /__proxy/client-cache` - Clear the in-memory freshness cache
/// - anything else - intercepted and answered by the proxy
///
/// # Middleware
/// - CORS: Allows any origin on the admin endpoints
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/prefetch", post(prefetch_handler))
        .route("/next-page", post(next_page_handler))
        .route(
            "/hover",
            post(hover_enter_handler).delete(hover_leave_handler),
        )
        .route("/client-cache", delete(clear_client_cache_handler))
        .layer(cors);

    Router::new()
        .nest(ADMIN_PREFIX, admin)
        .fallback(intercept_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::clock::{ManualClock, SharedClock};
    use crate::config::Config;
    use crate::prefetch::PrefetchScheduler;
    use crate::proxy::{Fetcher, Proxy, ProxySettings, ScriptedFetcher};
    use crate::store::{shared, CachedResponse, DurableStore};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, Arc<ScriptedFetcher>) {
        let config = Config {
            origin_url: "http://origin.test".to_string(),
            base_url: "http://origin.test/data".to_string(),
            ..Config::default()
        };
        let fetcher = Arc::new(ScriptedFetcher::new());
        let proxy = Arc::new(Proxy::new(
            ProxySettings::from_config(&config).unwrap(),
            shared(DurableStore::new()),
            fetcher.clone() as Arc<dyn Fetcher>,
            Arc::new(ManualClock::new(0)) as SharedClock,
        ));
        let state = AppState::from_config(&config, proxy, PrefetchScheduler::new(3));
        (create_router(state), fetcher)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/__proxy/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/__proxy/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path_is_intercepted() {
        let (app, fetcher) = create_test_app();
        fetcher.route(
            "http://origin.test/app.js",
            CachedResponse::text(200, "console.log(1)"),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/app.js")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fetcher.requested(), vec!["http://origin.test/app.js"]);
    }

    #[tokio::test]
    async fn test_prefetch_endpoint_rejects_bad_json() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/__proxy/prefetch")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"endpoint":"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(
            response.status() == StatusCode::BAD_REQUEST
                || response.status() == StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn test_foreign_absolute_uri_is_rejected() {
        let (app, fetcher) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("http://169.254.169.254/latest/meta-data/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(fetcher.requested().is_empty());
    }

    #[tokio::test]
    async fn test_next_page_endpoint() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/__proxy/next-page")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"current_page":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_hover_endpoints() {
        let (app, _) = create_test_app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/__proxy/hover")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"user_id":42}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/__proxy/hover")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
