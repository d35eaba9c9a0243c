//! # Worker Configuration
//!
//! Unified configuration for every component, with environment overrides.
//!
//! ## Requirements
//!
//! - At least one execution slot and a non-zero failure threshold
//! - The process timeout is strictly shorter than the request timeout, so a
//!   caller hears about a hung tool before giving up on its own
//! - The safe root is absolute

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use aw_02_process_runner::RunnerConfig;
use aw_04_concurrency_gate::GateConfig;
use aw_05_dispatcher::{DispatcherConfig, DEFAULT_REQUEST_TIMEOUT};
use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use thiserror::Error;
use tracing::warn;

/// Complete worker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Concurrency gate and circuit breaker.
    pub gate: GateConfig,
    /// How the external tool is launched.
    pub runner: RunnerConfig,
    /// Caller side of the protocol.
    pub client: ClientConfig,
    /// In-memory bus.
    pub bus: BusConfig,
    /// Request topic consumer.
    pub dispatcher: DispatcherConfig,
    /// How often engine metrics are exported and logged.
    pub metrics_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            gate: GateConfig::default(),
            runner: RunnerConfig::default(),
            client: ClientConfig::default(),
            bus: BusConfig::default(),
            dispatcher: DispatcherConfig::default(),
            metrics_interval: Duration::from_secs(30),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// How long a caller waits for its response.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Bus configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Messages buffered per subscriber before the oldest are dropped.
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("failure_threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("process timeout ({process:?}) must be shorter than request timeout ({request:?})")]
    TimeoutOrder {
        process: Duration,
        request: Duration,
    },

    #[error("safe root must be an absolute path: {0}")]
    RelativeSafeRoot(PathBuf),

    #[error("bus capacity must be at least 1")]
    ZeroBusCapacity,
}

impl WorkerConfig {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden from `lookup`. Unparseable values are logged and
    /// ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(n) = parsed(&lookup, "AW_MAX_CONCURRENCY") {
            config.gate.max_concurrency = n;
        }
        if let Some(n) = parsed(&lookup, "AW_FAILURE_THRESHOLD") {
            config.gate.failure_threshold = n;
        }
        if let Some(secs) = parsed(&lookup, "AW_CIRCUIT_COOLDOWN_SECS") {
            config.gate.cooldown = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed(&lookup, "AW_REQUEST_TIMEOUT_SECS") {
            config.client.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed(&lookup, "AW_PROCESS_TIMEOUT_SECS") {
            config.runner.process_timeout = Duration::from_secs(secs);
        }
        if let Some(program) = lookup("AW_TOOL_PROGRAM") {
            config.runner.program = program;
        }
        if let Some(args) = lookup("AW_TOOL_BASE_ARGS") {
            config.runner.base_args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(root) = lookup("AW_SAFE_ROOT") {
            config.runner.safe_root = PathBuf::from(root);
        }
        if let Some(n) = parsed(&lookup, "AW_BUS_CAPACITY") {
            config.bus.capacity = n;
        }
        if let Some(secs) = parsed(&lookup, "AW_METRICS_INTERVAL_SECS") {
            config.metrics_interval = Duration::from_secs(secs);
        }

        config
    }

    /// Check the configuration before anything is started.
    ///
    /// # Errors
    ///
    /// The first violated requirement.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gate.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.gate.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        if self.runner.process_timeout >= self.client.request_timeout {
            return Err(ConfigError::TimeoutOrder {
                process: self.runner.process_timeout,
                request: self.client.request_timeout,
            });
        }
        if !self.runner.safe_root.is_absolute() {
            return Err(ConfigError::RelativeSafeRoot(self.runner.safe_root.clone()));
        }
        if self.bus.capacity == 0 {
            return Err(ConfigError::ZeroBusCapacity);
        }
        Ok(())
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}
