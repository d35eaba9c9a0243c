//! Circuit breaker over consecutive execution failures.
//!
//! # States
//!
//! ```text
//!                 N consecutive failures
//!      ┌──────────┐ ──────────────────────► ┌──────────┐
//!      │  CLOSED  │                         │   OPEN   │
//!      │ (admit)  │ ◄────────────────────── │ (reject) │
//!      └──────────┘   cooldown elapsed,     └──────────┘
//!        │     ▲      counter reset
//!        └─────┘
//!        success resets counter
//! ```
//!
//! There is no half-open probing: the first admission after the cooldown
//! closes the circuit outright.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

/// Observable state of the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Admitting work.
    Closed { consecutive_failures: u32 },
    /// Rejecting work until `retry_after` has passed.
    Open { retry_after: Duration },
}

impl CircuitState {
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitState::Open { .. })
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed { .. } => write!(f, "closed"),
            CircuitState::Open { .. } => write!(f, "open"),
        }
    }
}

struct Circuit {
    consecutive_failures: u32,
    reopen_at: Option<Instant>,
}

/// Consecutive-failure circuit breaker.
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    circuit: Mutex<Circuit>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            circuit: Mutex::new(Circuit {
                consecutive_failures: 0,
                reopen_at: None,
            }),
        }
    }

    /// Admit or reject. Closes the circuit if its cooldown has elapsed.
    ///
    /// # Errors
    ///
    /// The time left until the circuit closes.
    pub fn check(&self) -> Result<(), Duration> {
        let mut circuit = self.circuit.lock();
        let Some(reopen_at) = circuit.reopen_at else {
            return Ok(());
        };

        let now = Instant::now();
        if now >= reopen_at {
            info!("Circuit breaker closing after cooldown");
            circuit.reopen_at = None;
            circuit.consecutive_failures = 0;
            return Ok(());
        }
        Err(reopen_at - now)
    }

    pub fn record_success(&self) {
        self.circuit.lock().consecutive_failures = 0;
    }

    /// Count a failure. Returns `true` if this failure opened the circuit.
    pub fn record_failure(&self) -> bool {
        let mut circuit = self.circuit.lock();
        // A lapsed cooldown counts as closed even if `check` has not run yet.
        if circuit.reopen_at.is_some_and(|at| Instant::now() >= at) {
            circuit.reopen_at = None;
            circuit.consecutive_failures = 0;
        }
        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);

        if circuit.consecutive_failures >= self.failure_threshold && circuit.reopen_at.is_none() {
            warn!(
                failures = circuit.consecutive_failures,
                threshold = self.failure_threshold,
                cooldown_secs = self.cooldown.as_secs(),
                "Circuit breaker opening due to failures"
            );
            circuit.reopen_at = Some(Instant::now() + self.cooldown);
            return true;
        }
        false
    }

    /// Current state, without side effects.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let circuit = self.circuit.lock();
        match circuit.reopen_at {
            Some(reopen_at) if Instant::now() < reopen_at => CircuitState::Open {
                retry_after: reopen_at - Instant::now(),
            },
            // Elapsed but not yet observed by `check`.
            Some(_) => CircuitState::Closed {
                consecutive_failures: 0,
            },
            None => CircuitState::Closed {
                consecutive_failures: circuit.consecutive_failures,
            },
        }
    }
}
