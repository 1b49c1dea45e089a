//! Proxy Lifecycle
//!
//! The proxy moves `Installing -> Activating -> Idle`, and is `Intercepting`
//! whenever at least one request is being handled while in control.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::{ProxyError, Result};

// == Proxy State ==
/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyState {
    Installing,
    Activating,
    Idle,
    Intercepting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Installing { installed: bool },
    Activating,
    Controlling,
}

// == Lifecycle ==
#[derive(Debug)]
pub struct Lifecycle {
    phase: Mutex<Phase>,
    in_flight: Arc<AtomicUsize>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(Phase::Installing { installed: false }),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn phase(&self) -> Phase {
        self.phase
            .lock()
            .map(|p| *p)
            .unwrap_or(Phase::Installing { installed: false })
    }

    fn set_phase(&self, phase: Phase) {
        if let Ok(mut p) = self.phase.lock() {
            *p = phase;
        }
    }

    /// Current state.
    pub fn state(&self) -> ProxyState {
        match self.phase() {
            Phase::Installing { .. } => ProxyState::Installing,
            Phase::Activating => ProxyState::Activating,
            Phase::Controlling if self.in_flight.load(Ordering::SeqCst) > 0 => {
                ProxyState::Intercepting
            }
            Phase::Controlling => ProxyState::Idle,
        }
    }

    /// True once requests are routed through the caching strategies.
    pub fn is_controlling(&self) -> bool {
        self.phase() == Phase::Controlling
    }

    /// Records that the shell was committed.
    pub fn mark_installed(&self) {
        if let Phase::Installing { .. } = self.phase() {
            self.set_phase(Phase::Installing { installed: true });
        }
    }

    /// Enters `Activating`. Refused unless install completed.
    pub fn begin_activation(&self) -> Result<()> {
        match self.phase() {
            Phase::Installing { installed: true } => {
                self.set_phase(Phase::Activating);
                Ok(())
            }
            Phase::Installing { installed: false } => Err(ProxyError::Lifecycle(
                "cannot activate before install completes".to_string(),
            )),
            Phase::Activating | Phase::Controlling => Err(ProxyError::Lifecycle(
                "generation already activated".to_string(),
            )),
        }
    }

    /// Takes control of requests.
    pub fn take_control(&self) {
        self.set_phase(Phase::Controlling);
    }

    /// Marks one request as in flight until the guard is dropped.
    pub fn enter(&self) -> InterceptGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InterceptGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

/// Decrements the in-flight count on drop.
#[derive(Debug)]
pub struct InterceptGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InterceptGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
