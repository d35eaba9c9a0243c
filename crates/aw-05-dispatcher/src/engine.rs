//! # Execution Engine
//!
//! One explicit engine object, created once at startup and shared by
//! reference. It owns the concurrency gate and the process runner; every
//! execution passes through both.
//!
//! ```text
//! ExecutionRequest ──→ gate.run( runner.run[_streaming] ──→ assemble ) ──→ ExecutionResponse
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use aw_02_process_runner::{Invocation, LineSink, ProcessRunner};
use aw_03_stream_assembler::{assemble, AssembledResult};
use aw_04_concurrency_gate::ConcurrencyGate;
use shared_types::{EngineMetrics, ExecutionError, ExecutionRequest, ExecutionResponse, Usage};
use tracing::{debug, info, warn};

/// Prompt used by the health check.
pub const HEALTH_PROMPT: &str = "Say healthy";

/// Marker the health check expects in the output.
pub const HEALTH_MARKER: &str = "healthy";

/// A failed execution, with whatever the tool reported before failing.
#[derive(Debug)]
struct ExecutionFailure {
    error: ExecutionError,
    usage: Option<Usage>,
    session_id: Option<String>,
}

impl From<ExecutionError> for ExecutionFailure {
    fn from(error: ExecutionError) -> Self {
        Self {
            error,
            usage: None,
            session_id: None,
        }
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

/// Gate plus runner plus assembler.
pub struct ExecutionEngine {
    gate: ConcurrencyGate,
    runner: ProcessRunner,
}

impl ExecutionEngine {
    pub fn new(gate: ConcurrencyGate, runner: ProcessRunner) -> Self {
        Self { gate, runner }
    }

    /// Execute a request. Every outcome, including rejection, becomes a
    /// response; this never fails.
    ///
    /// With a `sink`, output lines are handed to it as they are produced and
    /// all of them have been handed over by the time this returns.
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
        sink: Option<Arc<dyn LineSink>>,
    ) -> ExecutionResponse {
        let started = Instant::now();
        let invocation = Invocation::from(request);

        let outcome = self
            .gate
            .run(async {
                let output = match sink {
                    Some(sink) => self.runner.run_streaming(&invocation, sink).await?,
                    None => self.runner.run(&invocation).await?,
                };
                let assembled = assemble(&output.lines)?;
                if assembled.is_error {
                    return Err(tool_failure(assembled));
                }
                Ok::<_, ExecutionFailure>(assembled)
            })
            .await;

        let elapsed = started.elapsed();
        match outcome {
            Ok(result) => {
                info!(
                    request_id = %request.id,
                    duration_ms = elapsed.as_millis() as u64,
                    session_id = ?result.session_id,
                    "Execution succeeded"
                );
                ExecutionResponse::success(
                    request.id,
                    result.output,
                    result.usage,
                    result.session_id,
                    elapsed,
                )
            }
            Err(failure) => {
                warn!(
                    request_id = %request.id,
                    error_kind = failure.error.kind(),
                    error = %failure.error,
                    "Execution failed"
                );
                ExecutionResponse::failure(request.id, &failure.error, elapsed)
                    .with_details(failure.usage, failure.session_id)
            }
        }
    }

    /// Run a trivial prompt end to end and look for the expected marker.
    pub async fn health_check(&self) -> bool {
        let request = ExecutionRequest::new(HEALTH_PROMPT);
        let response = self.execute(&request, None).await;
        let healthy = response.success && response.output.to_lowercase().contains(HEALTH_MARKER);
        debug!(healthy, output = %response.output, "Health check finished");
        healthy
    }

    /// Snapshot of the running counters.
    #[must_use]
    pub fn metrics(&self) -> EngineMetrics {
        self.gate.metrics()
    }

    #[must_use]
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    #[must_use]
    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }
}

fn tool_failure(result: AssembledResult) -> ExecutionFailure {
    ExecutionFailure {
        error: ExecutionError::Tool(result.output),
        usage: result.usage,
        session_id: result.session_id,
    }
}
