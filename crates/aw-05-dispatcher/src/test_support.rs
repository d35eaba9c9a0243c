//! Fake-tool engines for unit tests.

use std::time::Duration;

use aw_02_process_runner::{ProcessRunner, RunnerConfig};
use aw_04_concurrency_gate::{ConcurrencyGate, GateConfig};
use tempfile::TempDir;

use crate::engine::ExecutionEngine;

/// Engine whose tool is `sh -c <script>`, confined to `root`.
pub(crate) fn engine_with_script(root: &TempDir, script: &str) -> ExecutionEngine {
    let runner = ProcessRunner::new(
        RunnerConfig::for_program("sh")
            .with_base_args(["-c", script])
            .with_safe_root(root.path())
            .with_process_timeout(Duration::from_secs(10)),
    );
    ExecutionEngine::new(ConcurrencyGate::new(GateConfig::default()), runner)
}
