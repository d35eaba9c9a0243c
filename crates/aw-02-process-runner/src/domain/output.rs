//! What a finished child process leaves behind.

use std::path::PathBuf;
use std::time::Duration;

use shared_types::ExecutionRequest;

/// One invocation of the tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Written to the child's standard input, then the input is closed.
    pub prompt: String,
    /// Appended after the configured base arguments.
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub project_id: Option<String>,
}

impl Invocation {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

impl From<&ExecutionRequest> for Invocation {
    fn from(request: &ExecutionRequest) -> Self {
        Self {
            prompt: request.prompt.clone(),
            args: request.args.clone(),
            cwd: request.cwd.clone(),
            project_id: request.project_id.clone(),
        }
    }
}

/// Output of a child that exited successfully with at least one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Non-empty output lines in production order, line endings stripped.
    pub lines: Vec<String>,
    /// Everything the child wrote to its error stream.
    pub stderr: String,
    /// Directory the child ran in.
    pub workdir: PathBuf,
    /// Time from spawn to exit.
    pub elapsed: Duration,
}
