//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to every log line.
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive.
    pub log_level: String,

    /// Whether to emit JSON formatted logs.
    pub json_logs: bool,

    /// Whether to write logs to the console at all.
    pub console_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "agent-worker".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            console_output: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AW_SERVICE_NAME`: Service name (default: agent-worker)
    /// - `AW_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `AW_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    /// - `AW_CONSOLE_OUTPUT`: Enable console output (default: true)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("AW_SERVICE_NAME")
                .unwrap_or_else(|_| "agent-worker".to_string()),

            log_level: env::var("AW_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("AW_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            console_output: env::var("AW_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
