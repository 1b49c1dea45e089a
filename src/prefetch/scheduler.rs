//! Prefetch Scheduler
//!
//! Runs best-effort tasks in priority order with at most `concurrency` in
//! flight. Completion of any task, successful or not, dispatches the next.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::prefetch::PrefetchQueue;

/// Work performed by one prefetch task.
pub type PrefetchFuture = Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send>>;

/// How a prefetch task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    Completed,
    Failed,
    /// The scheduler was reset before the task ran
    Discarded,
}

/// Lets the scheduling side observe a task's outcome. Dropping it is fine.
#[derive(Debug)]
pub struct TaskHandle {
    done: oneshot::Receiver<PrefetchOutcome>,
}

impl TaskHandle {
    pub async fn outcome(self) -> PrefetchOutcome {
        self.done.await.unwrap_or(PrefetchOutcome::Discarded)
    }
}

struct PrefetchTask {
    label: String,
    operation: PrefetchFuture,
    done: oneshot::Sender<PrefetchOutcome>,
}

// == Scheduler Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub scheduled: u64,
    pub completed: u64,
    pub failed: u64,
    pub in_flight: usize,
    pub queued: usize,
    pub max_in_flight: usize,
}

struct SchedulerState {
    queue: PrefetchQueue<PrefetchTask>,
    in_flight: usize,
    paused: bool,
    stats: SchedulerStats,
}

// == Prefetch Scheduler ==
/// Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct PrefetchScheduler {
    state: Arc<Mutex<SchedulerState>>,
    concurrency: usize,
}

impl PrefetchScheduler {
    /// Creates a scheduler that dispatches as soon as tasks arrive.
    pub fn new(concurrency: usize) -> Self {
        Self::build(concurrency, false)
    }

    /// Creates a scheduler that only queues until `resume` is called.
    pub fn paused(concurrency: usize) -> Self {
        Self::build(concurrency, true)
    }

    fn build(concurrency: usize, paused: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState {
                queue: PrefetchQueue::new(),
                in_flight: 0,
                paused,
                stats: SchedulerStats::default(),
            })),
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    // == Schedule ==
    /// Accepts a task into the backlog and dispatches what fits.
    ///
    /// Must be called within a tokio runtime.
    pub fn schedule<F>(&self, label: impl Into<String>, priority: i32, operation: F) -> TaskHandle
    where
        F: Future<Output = Result<(), ClientError>> + Send + 'static,
    {
        let (done, receiver) = oneshot::channel();
        let task = PrefetchTask {
            label: label.into(),
            operation: Box::pin(operation),
            done,
        };

        if let Ok(mut state) = self.state.lock() {
            debug!("Queued prefetch {} at priority {}", task.label, priority);
            state.queue.push(priority, task);
            state.stats.scheduled += 1;
        }

        self.dispatch();
        TaskHandle { done: receiver }
    }

    /// Starts dispatching after `paused`.
    pub fn resume(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.paused = false;
        }
        self.dispatch();
    }

    /// Discards every queued task. Tasks already running finish normally.
    pub fn reset(&self) -> usize {
        match self.state.lock() {
            Ok(mut state) => {
                let dropped = state.queue.len();
                state.queue.clear();
                dropped
            }
            Err(_) => 0,
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.state
            .lock()
            .map(|state| {
                let mut stats = state.stats.clone();
                stats.in_flight = state.in_flight;
                stats.queued = state.queue.len();
                stats
            })
            .unwrap_or_default()
    }

    // == Dispatch ==
    fn dispatch(&self) {
        loop {
            let task = {
                let Ok(mut state) = self.state.lock() else {
                    return;
                };
                if state.paused || state.in_flight >= self.concurrency {
                    return;
                }
                let Some(task) = state.queue.pop() else {
                    return;
                };
                state.in_flight += 1;
                state.stats.max_in_flight = state.stats.max_in_flight.max(state.in_flight);
                task
            };

            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.run(task).await;
            });
        }
    }

    async fn run(self, task: PrefetchTask) {
        let PrefetchTask {
            label,
            operation,
            done,
        } = task;
        let mut slot = Slot {
            scheduler: self,
            outcome: None,
            done: Some(done),
        };

        let outcome = match operation.await {
            Ok(()) => {
                debug!("Prefetched {}", label);
                PrefetchOutcome::Completed
            }
            Err(e) => {
                warn!("Prefetch of {} failed: {}", label, e);
                PrefetchOutcome::Failed
            }
        };
        slot.outcome = Some(outcome);
    }
}

/// One occupied concurrency slot.
///
/// Dropping it frees the slot, reports the outcome and dispatches the next
/// task, so a task that panics still gives its slot back (as `Failed`).
struct Slot {
    scheduler: PrefetchScheduler,
    outcome: Option<PrefetchOutcome>,
    done: Option<oneshot::Sender<PrefetchOutcome>>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        let outcome = self.outcome.unwrap_or(PrefetchOutcome::Failed);

        if let Ok(mut state) = self.scheduler.state.lock() {
            state.in_flight = state.in_flight.saturating_sub(1);
            match outcome {
                PrefetchOutcome::Completed => state.stats.completed += 1,
                _ => state.stats.failed += 1,
            }
        }
        if let Some(done) = self.done.take() {
            let _ = done.send(outcome);
        }

        self.scheduler.dispatch();
    }
}
