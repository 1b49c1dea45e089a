//! Offline Proxy - caching and prefetch core for a static data viewer
//!
//! Fronts the data site's origin, keeps a durable cache of what it served,
//! and prefetches data endpoints in the background.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offline_proxy::api::{create_router, AppState};
use offline_proxy::clock::system_clock;
use offline_proxy::config::Config;
use offline_proxy::prefetch::PrefetchScheduler;
use offline_proxy::proxy::{Fetcher, HttpFetcher, Proxy, ProxySettings};
use offline_proxy::store::{shared, DurableStore};
use offline_proxy::tasks::{load_snapshot, persist_snapshot, spawn_snapshot_task};

/// Main entry point for the offline proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Restore the durable store from its snapshot, if configured
/// 4. Install the cache generation, then activate it (or start degraded)
/// 5. Queue startup prefetches while the scheduler is held
/// 6. Start HTTP server on configured port and release the scheduler
/// 7. Handle graceful shutdown on SIGINT/SIGTERM, writing a final snapshot
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Offline Proxy");

    let config = Config::from_env();
    info!(
        "Configuration loaded: origin={}, generation={}, cache_duration={}ms, port={}, prefetch_concurrency={}",
        config.origin_url,
        config.generation,
        config.cache_duration_ms,
        config.server_port,
        config.prefetch_concurrency
    );

    let mut store = match &config.snapshot_path {
        Some(path) => match load_snapshot(path).await {
            Ok(store) => store,
            Err(e) => {
                warn!("Ignoring unreadable snapshot {}: {}", path.display(), e);
                DurableStore::new()
            }
        },
        None => DurableStore::new(),
    };
    let evicted = store.set_max_entries(config.max_cache_entries);
    if evicted > 0 {
        info!(
            "Evicted {} restored entries over the cap of {}",
            evicted, config.max_cache_entries
        );
    }
    let store = shared(store);

    let fetcher = HttpFetcher::new(Duration::from_millis(config.upstream_timeout_ms))
        .context("failed to build upstream HTTP client")?;
    let settings = ProxySettings::from_config(&config).context("invalid proxy settings")?;
    let proxy = Arc::new(Proxy::new(
        settings,
        store.clone(),
        Arc::new(fetcher) as Arc<dyn Fetcher>,
        system_clock(),
    ));

    match proxy.install().await {
        Ok(report) => {
            info!(
                "Installed {}: {} shell pages, {} warmed, {} warm-up failures",
                report.generation, report.shell_cached, report.warmed, report.warm_failures
            );
            proxy.activate().await.context("activation failed")?;
        }
        Err(e) => {
            error!("Install failed: {}", e);
            let served = proxy.serve_degraded().await;
            warn!("Running degraded on generation {}", served);
        }
    }

    // Startup prefetches queue up before any task runs so priority decides order
    let scheduler = PrefetchScheduler::paused(config.prefetch_concurrency);
    let state = AppState::from_config(&config, proxy.clone(), scheduler.clone());
    let queued = state.prefetcher.warm_startup().len();
    info!("Queued {} startup prefetches", queued);

    let snapshot_handle = config
        .snapshot_path
        .clone()
        .map(|path| spawn_snapshot_task(store.clone(), path, config.snapshot_interval));

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    scheduler.resume();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(snapshot_handle))
        .await
        .context("server error")?;

    if let Some(path) = &config.snapshot_path {
        match persist_snapshot(&store, path).await {
            Ok(entries) => info!("Final snapshot: wrote {} entries", entries),
            Err(e) => error!("Final snapshot failed: {}", e),
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the snapshot task and allows graceful shutdown.
async fn shutdown_signal(snapshot_handle: Option<tokio::task::JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = snapshot_handle {
        handle.abort();
        warn!("Snapshot task aborted");
    }
}
