//! # Worker Telemetry
//!
//! Logging and metrics for the agent worker.
//!
//! ## Components
//!
//! - **Logs**: a global `tracing` subscriber, JSON or pretty
//! - **Metrics**: Prometheus gauges mirroring the engine counters
//!
//! ## Usage
//!
//! ```rust,ignore
//! use worker_telemetry::{init_tracing, TelemetryConfig, WorkerMetrics};
//!
//! init_tracing(&TelemetryConfig::from_env())?;
//! let metrics = WorkerMetrics::new()?;
//! metrics.record_snapshot(&engine.metrics(), false, 0);
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AW_LOG_LEVEL` | `RUST_LOG`, then `info` | Log level filter |
//! | `AW_JSON_LOGS` | `true` in containers | JSON formatted logs |
//! | `AW_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `AW_SERVICE_NAME` | `agent-worker` | Service name in logs |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_tracing;
pub use metrics::WorkerMetrics;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install log subscriber: {0}")]
    Init(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
