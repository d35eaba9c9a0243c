//! Running engine counters.

use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use shared_types::EngineMetrics;

#[derive(Default)]
struct Counters {
    metrics: EngineMetrics,
    /// Executions that ran (rejections excluded), for the average.
    timed: u64,
}

/// Records outcomes and produces `EngineMetrics` snapshots.
#[derive(Default)]
pub struct MetricsRecorder {
    counters: Mutex<Counters>,
}

impl MetricsRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A request reached the gate.
    pub fn record_request(&self) {
        self.counters.lock().metrics.total_requests += 1;
    }

    /// A request was refused without running.
    pub fn record_rejection(&self, error: &str) {
        let mut counters = self.counters.lock();
        counters.metrics.failed_requests += 1;
        set_last_error(&mut counters.metrics, error);
    }

    /// An execution finished successfully.
    pub fn record_success(&self, duration: Duration) {
        let mut counters = self.counters.lock();
        counters.metrics.successful_requests += 1;
        record_duration(&mut counters, duration);
    }

    /// An execution ran and failed.
    pub fn record_failure(&self, duration: Duration, error: &str) {
        let mut counters = self.counters.lock();
        counters.metrics.failed_requests += 1;
        set_last_error(&mut counters.metrics, error);
        record_duration(&mut counters, duration);
    }

    /// Snapshot with the given live slot count.
    #[must_use]
    pub fn snapshot(&self, active: usize) -> EngineMetrics {
        let mut metrics = self.counters.lock().metrics.clone();
        metrics.active_requests = active as u64;
        metrics
    }
}

fn set_last_error(metrics: &mut EngineMetrics, error: &str) {
    metrics.last_error = Some(error.to_string());
    metrics.last_error_at = Some(Utc::now());
}

fn record_duration(counters: &mut Counters, duration: Duration) {
    counters.timed += 1;
    let sample = duration.as_secs_f64() * 1000.0;
    let avg = &mut counters.metrics.average_duration_ms;
    *avg += (sample - *avg) / counters.timed as f64;
}
