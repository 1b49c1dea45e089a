//! Prefetch Triggers
//!
//! Turns application signals (startup, hover intent, pagination) into
//! scheduled data-client fetches.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::client::{endpoints, DataClient};
use crate::prefetch::{PrefetchScheduler, TaskHandle};

/// Startup data the first screen needs.
pub const PRIORITY_STARTUP: i32 = 10;

/// A profile the pointer is resting on.
pub const PRIORITY_HOVER: i32 = 7;

/// The page after the one being viewed.
pub const PRIORITY_PAGINATION: i32 = 5;

// == Prefetcher ==
/// Schedules data-client fetches, skipping endpoints already fresh in memory.
#[derive(Clone)]
pub struct Prefetcher {
    client: Arc<DataClient>,
    scheduler: PrefetchScheduler,
}

impl Prefetcher {
    pub fn new(client: Arc<DataClient>, scheduler: PrefetchScheduler) -> Self {
        Self { client, scheduler }
    }

    pub fn scheduler(&self) -> &PrefetchScheduler {
        &self.scheduler
    }

    pub fn client(&self) -> &Arc<DataClient> {
        &self.client
    }

    /// Schedules a GET of `endpoint`.
    ///
    /// Returns `None` without scheduling when the endpoint is already fresh.
    pub fn prefetch(&self, endpoint: impl Into<String>, priority: i32) -> Option<TaskHandle> {
        let endpoint = endpoint.into();
        if self.client.is_cached(&endpoint) {
            debug!("Skipping prefetch of fresh {}", endpoint);
            return None;
        }

        let client = Arc::clone(&self.client);
        let key = endpoint.clone();
        Some(self.scheduler.schedule(endpoint, priority, async move {
            client.fetch(&key).await.map(|_| ())
        }))
    }

    /// Warms the startup endpoints.
    pub fn warm_startup(&self) -> Vec<TaskHandle> {
        endpoints::STARTUP
            .iter()
            .filter_map(|endpoint| self.prefetch(*endpoint, PRIORITY_STARTUP))
            .collect()
    }

    /// Looks ahead one page once `current_page` has rendered.
    pub fn prefetch_next_page(&self, current_page: u32) -> Option<TaskHandle> {
        let next = current_page.checked_add(1)?;
        self.prefetch(endpoints::user_page(next), PRIORITY_PAGINATION)
    }

    /// Creates a hover tracker that waits `settle` before prefetching.
    pub fn hover_intent(&self, settle: Duration) -> HoverIntent {
        HoverIntent {
            prefetcher: self.clone(),
            settle,
            pending: Mutex::new(None),
        }
    }
}

// == Hover Intent ==
/// Debounced profile prefetch.
///
/// The prefetch is only scheduled if the pointer stays for the settle delay.
/// Leaving cancels the timer; a fetch that already started runs to completion.
pub struct HoverIntent {
    prefetcher: Prefetcher,
    settle: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl HoverIntent {
    /// Pointer entered the link for `user_id`. Replaces any pending timer.
    pub fn pointer_enter(&self, user_id: u64) {
        let prefetcher = self.prefetcher.clone();
        let settle = self.settle;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            prefetcher.prefetch(endpoints::user_path(user_id), PRIORITY_HOVER);
        });

        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.replace(timer) {
                previous.abort();
            }
        }
    }

    /// Pointer left before the settle delay elapsed.
    pub fn pointer_leave(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(timer) = pending.take() {
                timer.abort();
            }
        }
    }

    /// True while a settle timer is still counting down.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .map(|p| p.as_ref().is_some_and(|t| !t.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for HoverIntent {
    fn drop(&mut self) {
        self.pointer_leave();
    }
}
