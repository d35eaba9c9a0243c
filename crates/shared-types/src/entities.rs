//! # Value Types
//!
//! Usage accounting and the engine metrics snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token usage and cost of one execution, normalised from the tool's
/// provider-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Prompt tokens billed.
    pub input_tokens: u64,
    /// Completion tokens billed.
    pub output_tokens: u64,
    /// Prompt tokens served from the provider's cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
    /// Prompt tokens written to the provider's cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
    /// Total cost in US dollars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl Usage {
    /// Total tokens, cache traffic included.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_read_input_tokens.unwrap_or(0))
            .saturating_add(self.cache_creation_input_tokens.unwrap_or(0))
    }
}

/// Read-only snapshot of the engine's running counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineMetrics {
    /// Requests that reached the concurrency gate, rejected ones included.
    pub total_requests: u64,
    /// Requests that completed successfully.
    pub successful_requests: u64,
    /// Requests that failed, circuit rejections included.
    pub failed_requests: u64,
    /// Requests currently holding an execution slot.
    pub active_requests: u64,
    /// Mean duration of completed executions, in milliseconds.
    pub average_duration_ms: f64,
    /// Message of the most recent failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// When the most recent failure happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<DateTime<Utc>>,
}

impl EngineMetrics {
    /// Fraction of finished requests that succeeded, if any finished.
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        let finished = self.successful_requests + self.failed_requests;
        if finished == 0 {
            return None;
        }
        Some(self.successful_requests as f64 / finished as f64)
    }
}
