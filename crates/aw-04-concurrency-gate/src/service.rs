//! # Concurrency Gate Service
//!
//! Wraps one unit of work:
//!
//! 1. Circuit open: reject with `CircuitOpen`, no slot taken.
//! 2. Wait for a slot. Waiters are admitted in arrival order.
//! 3. Run the work; success resets the failure streak, failure extends it
//!    and may open the circuit. The outcome is returned unchanged.
//! 4. Release the slot to the next waiter.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use shared_types::{EngineMetrics, ExecutionError};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::{CircuitBreaker, CircuitState, GateConfig, MetricsRecorder};

/// Bounds concurrent executions and contains clustered failures.
pub struct ConcurrencyGate {
    config: GateConfig,
    slots: Semaphore,
    active: AtomicUsize,
    queued: AtomicUsize,
    circuit: CircuitBreaker,
    metrics: MetricsRecorder,
}

impl ConcurrencyGate {
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        let max = config.max_concurrency.max(1);
        Self {
            config,
            slots: Semaphore::new(max),
            active: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            circuit: CircuitBreaker::new(config.failure_threshold, config.cooldown),
            metrics: MetricsRecorder::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Run `work` under the gate.
    ///
    /// # Errors
    ///
    /// `CircuitOpen` (converted into `E`) when the circuit is open, otherwise
    /// whatever `work` returned.
    pub async fn run<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<ExecutionError> + Display,
    {
        self.metrics.record_request();

        if let Err(retry_after) = self.circuit.check() {
            let error = ExecutionError::CircuitOpen {
                retry_after_ms: u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
            };
            debug!(retry_after_ms = retry_after.as_millis() as u64, "Admission rejected, circuit open");
            self.metrics.record_rejection(&error.to_string());
            return Err(E::from(error));
        }

        let permit = {
            let _waiting = CountGuard::enter(&self.queued);
            self.slots.acquire().await.map_err(|_| {
                E::from(ExecutionError::Validation(
                    "concurrency gate is closed".to_string(),
                ))
            })?
        };
        let _active = CountGuard::enter(&self.active);

        let started = Instant::now();
        let outcome = work.await;
        let elapsed = started.elapsed();

        match &outcome {
            Ok(_) => {
                self.circuit.record_success();
                self.metrics.record_success(elapsed);
            }
            Err(e) => {
                let message = e.to_string();
                if self.circuit.record_failure() {
                    warn!(error = %message, "Execution failure opened the circuit");
                }
                self.metrics.record_failure(elapsed, &message);
            }
        }

        // Leave the active count before a waiter can take the slot.
        drop(_active);
        drop(permit);
        outcome
    }

    /// Executions currently holding a slot.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Callers waiting for a slot.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    /// Snapshot of the running counters.
    #[must_use]
    pub fn metrics(&self) -> EngineMetrics {
        self.metrics.snapshot(self.active())
    }
}

/// Increments a counter for the guard's lifetime, including when the owning
/// future is dropped mid-wait.
struct CountGuard<'a>(&'a AtomicUsize);

impl<'a> CountGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
