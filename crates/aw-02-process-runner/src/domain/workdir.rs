//! # Working Directory Derivation
//!
//! Every execution runs inside a directory. Concurrent executions for
//! different projects must never share one.
//!
//! | Priority | Source | Result |
//! |----------|--------|--------|
//! | 1 | `cwd` on the request | used as given (still guarded) |
//! | 2 | `project_id` on the request | `<safe_root>/<sanitised id>` |
//! | 3 | `"projectId": "<id>"` inside prompt or args | `<safe_root>/<sanitised id>` |
//! | 4 | nothing | `<safe_root>/<fresh uuid>` |

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use shared_types::ExecutionError;
use tracing::debug;
use uuid::Uuid;

/// Longest project id kept after sanitising.
pub const MAX_PROJECT_ID_LEN: usize = 64;

lazy_static! {
    static ref PROJECT_ID_PATTERN: Option<Regex> =
        Regex::new(r#""projectId"\s*:\s*"([^"]+)""#).ok();
}

/// Where a working directory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkdirSource {
    /// The request named a directory.
    Explicit,
    /// The request carried a project id.
    ProjectId,
    /// A project id was found in the prompt or arguments.
    Sniffed,
    /// Nothing identified a project; a fresh id was generated.
    Generated,
}

/// A resolved working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workdir {
    pub path: PathBuf,
    pub source: WorkdirSource,
}

/// Reduce a project id to `[A-Za-z0-9_-]`, at most 64 characters.
///
/// Returns `None` when nothing usable remains.
#[must_use]
pub fn sanitize_project_id(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_PROJECT_ID_LEN)
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Find a `"projectId": "<id>"` field in the prompt, then in the arguments.
#[must_use]
pub fn sniff_project_id(prompt: &str, args: &[String]) -> Option<String> {
    let pattern = PROJECT_ID_PATTERN.as_ref()?;
    std::iter::once(prompt)
        .chain(args.iter().map(String::as_str))
        .find_map(|text| pattern.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| sanitize_project_id(m.as_str()))
}

/// Pick the working directory for an execution.
///
/// # Errors
///
/// `Validation` if an explicit project id has no usable characters.
pub fn resolve_workdir(
    cwd: Option<&Path>,
    project_id: Option<&str>,
    prompt: &str,
    args: &[String],
    safe_root: &Path,
) -> Result<Workdir, ExecutionError> {
    if let Some(cwd) = cwd {
        return Ok(Workdir {
            path: cwd.to_path_buf(),
            source: WorkdirSource::Explicit,
        });
    }

    if let Some(raw) = project_id {
        let id = sanitize_project_id(raw).ok_or_else(|| {
            ExecutionError::Validation(format!("project id {raw:?} has no usable characters"))
        })?;
        return Ok(Workdir {
            path: safe_root.join(id),
            source: WorkdirSource::ProjectId,
        });
    }

    if let Some(id) = sniff_project_id(prompt, args) {
        debug!(project_id = %id, "Project id found in prompt text");
        return Ok(Workdir {
            path: safe_root.join(id),
            source: WorkdirSource::Sniffed,
        });
    }

    Ok(Workdir {
        path: safe_root.join(Uuid::new_v4().to_string()),
        source: WorkdirSource::Generated,
    })
}
