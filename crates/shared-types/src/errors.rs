//! # Error Types
//!
//! The engine-wide failure taxonomy. Every failure a request can meet ends up
//! as one of these variants and is surfaced to the caller as the terminal
//! response's `error` text; none of them crash the dispatcher.

use thiserror::Error;

/// Errors produced while executing a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// The request was rejected before any process was spawned.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The external tool could not be started.
    #[error("Failed to spawn `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    /// Writing the prompt to, or reading from, the child failed.
    #[error("I/O error on child process: {0}")]
    Io(String),

    /// The child exited unsuccessfully.
    #[error("Process exited with {}: {stderr}", describe_exit(.code))]
    ProcessExit { code: Option<i32>, stderr: String },

    /// The child exited successfully but wrote nothing.
    #[error("Process produced no output")]
    EmptyOutput,

    /// An operation did not complete in time.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    /// No result could be assembled from the output.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The tool ran to completion but reported an error result.
    #[error("Tool reported an error: {0}")]
    Tool(String),

    /// Admission refused because the circuit breaker is open.
    #[error("Circuit breaker is open; retry in {retry_after_ms}ms")]
    CircuitOpen { retry_after_ms: u64 },

    /// Publishing or subscribing on the message bus failed.
    #[error("Message bus error: {0}")]
    Bus(String),
}

impl ExecutionError {
    /// Stable machine-readable name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Spawn { .. } => "spawn",
            Self::Io(_) => "io",
            Self::ProcessExit { .. } => "process_exit",
            Self::EmptyOutput => "empty_output",
            Self::Timeout { .. } => "timeout",
            Self::Parse(_) => "parse",
            Self::Tool(_) => "tool",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Bus(_) => "bus",
        }
    }

    /// Shorthand for a timeout of the named operation.
    pub fn timeout(operation: impl Into<String>, after: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
