//! Test fixtures shared by the integration tests.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tempfile::TempDir;
use worker_runtime::{WorkerConfig, WorkerRuntime};

/// Fake tool that answers with its own prompt as the result text.
pub const ECHO_PROMPT: &str =
    r#"p=$(cat); printf '{"type":"system","session_id":"sess-e2e"}\n{"type":"result","result":"%s"}\n' "$p""#;

/// Worker config whose tool is `sh -c <script>`, confined to `root`.
pub fn config_for(root: &TempDir, script: &str) -> WorkerConfig {
    let mut config = WorkerConfig::default();
    config.runner.program = "sh".to_string();
    config.runner.base_args = vec!["-c".to_string(), script.to_string()];
    config.runner.safe_root = root.path().to_path_buf();
    config.runner.process_timeout = Duration::from_secs(10);
    config.client.request_timeout = Duration::from_secs(20);
    config.dispatcher.drain_timeout = Duration::from_secs(5);
    config
}

/// A started worker.
pub fn start_worker(config: WorkerConfig) -> WorkerRuntime {
    let runtime = WorkerRuntime::new(config).unwrap();
    runtime.start();
    runtime
}

/// Poll `condition` until it holds or a second passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
