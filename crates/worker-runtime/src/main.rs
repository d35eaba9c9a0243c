//! # Agent Worker
//!
//! Runs an external command-line AI tool on behalf of many callers over a
//! publish/subscribe bus.
//!
//! ## Startup Sequence
//!
//! 1. Initialise logging from the environment
//! 2. Load and validate configuration
//! 3. Start the dispatcher and metrics loops
//! 4. Run the startup health check (logged, not fatal)
//! 5. Wait for Ctrl-C, then shut down gracefully

use anyhow::{Context, Result};
use tracing::{info, warn};
use worker_runtime::{WorkerConfig, WorkerRuntime};
use worker_telemetry::{init_tracing, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&TelemetryConfig::from_env()).context("initialising logging")?;

    let config = WorkerConfig::from_env();
    config.validate().context("invalid configuration")?;

    let runtime = WorkerRuntime::new(config).context("building runtime")?;
    runtime.start();

    if runtime.engine().health_check().await {
        info!("Tool health check passed");
    } else {
        warn!("Tool health check failed; requests will be attempted anyway");
    }

    info!("Worker is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
