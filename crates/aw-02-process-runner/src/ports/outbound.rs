//! Outbound (Driven) ports for the Process Runner.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shared_types::ExecutionError;
use thiserror::Error;

/// Why a path was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathGuardError {
    #[error("path {0} is not absolute")]
    Relative(PathBuf),

    #[error("path {0} contains a parent-directory component")]
    ParentTraversal(PathBuf),

    #[error("path {path} is outside {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("path {path} resolves to {resolved}, outside {root}")]
    LinkEscape {
        path: PathBuf,
        resolved: PathBuf,
        root: PathBuf,
    },

    #[error("could not create {path}: {reason}")]
    Create { path: PathBuf, reason: String },
}

impl From<PathGuardError> for ExecutionError {
    fn from(err: PathGuardError) -> Self {
        ExecutionError::Validation(err.to_string())
    }
}

/// Decides which directories the tool may run in.
///
/// A refusal aborts the request; the runner never falls back to another
/// directory.
#[async_trait]
pub trait PathGuard: Send + Sync {
    /// Accept or reject `path`.
    fn validate(&self, path: &Path) -> Result<(), PathGuardError>;

    /// Create `path` and any missing parents.
    async fn create_safe_directory(&self, path: &Path) -> Result<(), PathGuardError>;
}

/// Receives output lines as they are produced in streaming mode.
///
/// The runner never waits on a sink from its read loop. Errors are logged and
/// otherwise ignored.
#[async_trait]
pub trait LineSink: Send + Sync {
    async fn on_line(&self, line: String) -> Result<(), ExecutionError>;
}
