//! # Worker Runtime
//!
//! Owns every long-lived component and the shutdown channel.
//!
//! ## Startup Sequence
//!
//! 1. Create the bus, the engine (gate + runner) and the dispatcher
//! 2. Subscribe the dispatcher to the request topic
//! 3. Spawn the dispatcher loop and the metrics loop
//!
//! ## Shutdown Sequence
//!
//! 1. Signal shutdown on the `watch` channel
//! 2. The dispatcher stops taking requests and drains in-flight ones
//! 3. Await both loops

use std::sync::Arc;

use aw_02_process_runner::ProcessRunner;
use aw_04_concurrency_gate::ConcurrencyGate;
use aw_05_dispatcher::{Dispatcher, ExecutionClient, ExecutionEngine};
use parking_lot::Mutex;
use shared_bus::{InMemoryMessageBus, MessageBus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use worker_telemetry::{TelemetryError, WorkerMetrics};

use crate::config::WorkerConfig;

/// The running worker.
pub struct WorkerRuntime {
    config: WorkerConfig,
    bus: Arc<InMemoryMessageBus>,
    engine: Arc<ExecutionEngine>,
    dispatcher: Arc<Dispatcher>,
    metrics: WorkerMetrics,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerRuntime {
    /// Build every component. Nothing runs until [`WorkerRuntime::start`].
    ///
    /// # Errors
    ///
    /// If the metrics registry cannot be created.
    pub fn new(config: WorkerConfig) -> Result<Self, TelemetryError> {
        let bus = Arc::new(InMemoryMessageBus::with_capacity(config.bus.capacity));
        let engine = Arc::new(ExecutionEngine::new(
            ConcurrencyGate::new(config.gate),
            ProcessRunner::new(config.runner.clone()),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&engine),
            Arc::clone(&bus) as Arc<dyn MessageBus>,
            config.dispatcher,
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            metrics: WorkerMetrics::new()?,
            config,
            bus,
            engine,
            dispatcher,
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the dispatcher and metrics loops.
    ///
    /// The dispatcher is subscribed before this returns, so requests
    /// published afterwards are never missed.
    pub fn start(&self) {
        info!(
            program = %self.config.runner.program,
            max_concurrency = self.config.gate.max_concurrency,
            safe_root = %self.config.runner.safe_root.display(),
            "Starting agent worker"
        );

        let requests = self.dispatcher.listen();
        let dispatcher = Arc::clone(&self.dispatcher);
        let dispatcher_task = tokio::spawn(dispatcher.run(requests, self.shutdown_rx.clone()));

        let metrics_task = tokio::spawn(metrics_loop(
            Arc::clone(&self.engine),
            self.metrics.clone(),
            self.config.metrics_interval,
            self.shutdown_rx.clone(),
        ));

        self.tasks.lock().extend([dispatcher_task, metrics_task]);
        info!("Agent worker running");
    }

    /// Signal shutdown and wait for both loops to finish.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Runtime task failed");
            }
        }
        info!("Shutdown complete");
    }

    /// A client bound to this worker's bus.
    #[must_use]
    pub fn client(&self) -> ExecutionClient {
        ExecutionClient::new(Arc::clone(&self.bus) as Arc<dyn MessageBus>)
            .with_request_timeout(self.config.client.request_timeout)
    }

    /// Export the current engine counters now.
    pub fn refresh_metrics(&self) {
        record(&self.engine, &self.metrics);
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<InMemoryMessageBus> {
        &self.bus
    }

    #[must_use]
    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

async fn metrics_loop(
    engine: Arc<ExecutionEngine>,
    metrics: WorkerMetrics,
    period: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = record(&engine, &metrics);
                info!(
                    total = snapshot.total_requests,
                    succeeded = snapshot.successful_requests,
                    failed = snapshot.failed_requests,
                    active = snapshot.active_requests,
                    avg_ms = snapshot.average_duration_ms,
                    "Engine metrics"
                );
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    record(&engine, &metrics);
}

fn record(engine: &ExecutionEngine, metrics: &WorkerMetrics) -> shared_types::EngineMetrics {
    let gate = engine.gate();
    let snapshot = engine.metrics();
    metrics.record_snapshot(&snapshot, gate.circuit_state().is_open(), gate.queued());
    snapshot
}
