//! Runner configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default wall-clock limit for one child process.
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(540);

/// Default root under which derived working directories are created.
pub const DEFAULT_SAFE_ROOT: &str = "/tmp/agent-worker/projects";

/// Default capacity of the line hand-off channel in streaming mode.
pub const DEFAULT_LINE_BUFFER: usize = 256;

/// How the external tool is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Executable name or path.
    pub program: String,

    /// Arguments placed before each request's own arguments.
    pub base_args: Vec<String>,

    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,

    /// Force-terminate the child after this long.
    pub process_timeout: Duration,

    /// Root of all derived working directories.
    pub safe_root: PathBuf,

    /// Lines buffered between the read loop and a slow line sink before the
    /// oldest are dropped.
    pub line_buffer: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            base_args: Vec::new(),
            env: Vec::new(),
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            safe_root: PathBuf::from(DEFAULT_SAFE_ROOT),
            line_buffer: DEFAULT_LINE_BUFFER,
        }
    }
}

impl RunnerConfig {
    /// Config for `program` with everything else defaulted.
    pub fn for_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Set the base arguments.
    #[must_use]
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the safe root.
    #[must_use]
    pub fn with_safe_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.safe_root = root.into();
        self
    }

    /// Set the process timeout.
    #[must_use]
    pub fn with_process_timeout(mut self, timeout: Duration) -> Self {
        self.process_timeout = timeout;
        self
    }

    /// Add an environment variable for the child.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}
