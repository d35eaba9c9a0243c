//! Prometheus export of the engine counters.
//!
//! All metrics follow the naming convention `aw_<metric>[_<unit>]`. The
//! engine keeps its own counters; these are refreshed from a snapshot, so
//! every metric is a gauge, including the cumulative ones.

use prometheus::{Encoder, Gauge, IntGauge, Registry, TextEncoder};
use shared_types::EngineMetrics;

use crate::TelemetryError;

/// Gauges mirroring [`EngineMetrics`], on a private registry.
#[derive(Clone)]
pub struct WorkerMetrics {
    registry: Registry,
    requests_total: IntGauge,
    requests_succeeded: IntGauge,
    requests_failed: IntGauge,
    requests_active: IntGauge,
    duration_avg_ms: Gauge,
    circuit_open: IntGauge,
    gate_queued: IntGauge,
}

impl WorkerMetrics {
    /// Create and register every metric.
    ///
    /// # Errors
    ///
    /// `MetricsInit` if a metric cannot be created or registered.
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let requests_total = int_gauge(
            &registry,
            "aw_requests_total",
            "Admission attempts, including circuit rejections",
        )?;
        let requests_succeeded = int_gauge(
            &registry,
            "aw_requests_succeeded_total",
            "Executions that produced a successful response",
        )?;
        let requests_failed = int_gauge(
            &registry,
            "aw_requests_failed_total",
            "Executions that failed or were rejected",
        )?;
        let requests_active = int_gauge(
            &registry,
            "aw_requests_active",
            "Executions currently holding a slot",
        )?;
        let duration_avg_ms = Gauge::new(
            "aw_request_duration_avg_ms",
            "Cumulative average execution duration in milliseconds",
        )
        .map_err(metrics_error)?;
        registry
            .register(Box::new(duration_avg_ms.clone()))
            .map_err(metrics_error)?;
        let circuit_open = int_gauge(
            &registry,
            "aw_circuit_open",
            "1 while the circuit breaker rejects new work",
        )?;
        let gate_queued = int_gauge(
            &registry,
            "aw_gate_queued",
            "Requests waiting for a slot",
        )?;

        Ok(Self {
            registry,
            requests_total,
            requests_succeeded,
            requests_failed,
            requests_active,
            duration_avg_ms,
            circuit_open,
            gate_queued,
        })
    }

    /// Overwrite every gauge from an engine snapshot.
    pub fn record_snapshot(&self, snapshot: &EngineMetrics, circuit_open: bool, queued: usize) {
        self.requests_total.set(saturate(snapshot.total_requests));
        self.requests_succeeded
            .set(saturate(snapshot.successful_requests));
        self.requests_failed.set(saturate(snapshot.failed_requests));
        self.requests_active.set(saturate(snapshot.active_requests));
        self.duration_avg_ms.set(snapshot.average_duration_ms);
        self.circuit_open.set(i64::from(circuit_open));
        self.gate_queued.set(saturate(queued as u64));
    }

    /// Encode all metrics in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// `MetricsInit` if encoding fails.
    pub fn gather_text(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(metrics_error)
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, TelemetryError> {
    let gauge = IntGauge::new(name, help).map_err(metrics_error)?;
    registry
        .register(Box::new(gauge.clone()))
        .map_err(metrics_error)?;
    Ok(gauge)
}

fn metrics_error(e: impl std::fmt::Display) -> TelemetryError {
    TelemetryError::MetricsInit(e.to_string())
}

fn saturate(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
