//! Path guard confining executions to one directory tree.
//!
//! `validate` is textual. `create_safe_directory` additionally resolves
//! symlinks, before and after creating, and compares against the resolved
//! root, so a link planted under the root cannot point the tool elsewhere.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::ports::{PathGuard, PathGuardError};

/// Accepts only absolute paths inside `root` with no `..` components.
#[derive(Debug, Clone)]
pub struct SafeRootGuard {
    root: PathBuf,
}

impl SafeRootGuard {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl PathGuard for SafeRootGuard {
    fn validate(&self, path: &Path) -> Result<(), PathGuardError> {
        if !path.is_absolute() {
            return Err(PathGuardError::Relative(path.to_path_buf()));
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(PathGuardError::ParentTraversal(path.to_path_buf()));
        }
        if !path.starts_with(&self.root) {
            return Err(PathGuardError::OutsideRoot {
                path: path.to_path_buf(),
                root: self.root.clone(),
            });
        }
        Ok(())
    }

    async fn create_safe_directory(&self, path: &Path) -> Result<(), PathGuardError> {
        self.validate(path)?;

        create_dir_all(&self.root).await?;
        let root = canonical(&self.root).await?;

        let existing = nearest_existing_ancestor(path).await;
        self.confine(path, &canonical(&existing).await?, &root)?;

        create_dir_all(path).await?;
        self.confine(path, &canonical(path).await?, &root)?;

        debug!(path = %path.display(), "Working directory ready");
        Ok(())
    }
}

impl SafeRootGuard {
    fn confine(&self, path: &Path, resolved: &Path, root: &Path) -> Result<(), PathGuardError> {
        if resolved.starts_with(root) {
            return Ok(());
        }
        Err(PathGuardError::LinkEscape {
            path: path.to_path_buf(),
            resolved: resolved.to_path_buf(),
            root: self.root.clone(),
        })
    }
}

async fn create_dir_all(path: &Path) -> Result<(), PathGuardError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| PathGuardError::Create {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

async fn canonical(path: &Path) -> Result<PathBuf, PathGuardError> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|e| PathGuardError::Create {
            path: path.to_path_buf(),
            reason: format!("cannot resolve: {e}"),
        })
}

/// Deepest ancestor of `path` (or `path` itself) that exists.
async fn nearest_existing_ancestor(path: &Path) -> PathBuf {
    for ancestor in path.ancestors() {
        if tokio::fs::metadata(ancestor).await.is_ok() {
            return ancestor.to_path_buf();
        }
    }
    PathBuf::from("/")
}
