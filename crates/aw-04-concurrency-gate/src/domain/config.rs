//! Gate configuration.

use std::time::Duration;

/// Limits applied by the concurrency gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Executions allowed to hold a slot at once.
    pub max_concurrency: usize,

    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open.
    pub cooldown: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}
