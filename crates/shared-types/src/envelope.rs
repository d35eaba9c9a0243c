//! # Execution Envelopes
//!
//! The three message shapes that travel over the bus.
//!
//! ## Flow
//!
//! ```text
//! caller ──ExecutionRequest──→ executions.requests ──→ dispatcher
//!                                                        │
//!   ←── StreamChunkEvent* (chunk.., end|error) ── executions.stream.<id>
//!   ←── ExecutionResponse (exactly one)        ── executions.response.<id>
//! ```
//!
//! ## Properties
//!
//! - **Correlation**: `id` is generated by the caller and copied verbatim
//!   into every message produced for that request.
//! - **Immutability**: A request is never mutated after publication; the
//!   dispatcher consumes it exactly once.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Usage;
use crate::errors::ExecutionError;
use crate::ipc;

/// A request to run the external tool once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Correlation id. Private topics are derived from it.
    pub id: Uuid,

    /// Prompt text, written to the tool's standard input.
    pub prompt: String,

    /// Ordered CLI arguments appended after the runner's base arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory requested by the caller. Must pass the path guard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Logical project the execution belongs to. Used to derive a working
    /// directory when `cwd` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Whether output lines should be forwarded on the stream topic.
    #[serde(default)]
    pub stream: bool,
}

impl ExecutionRequest {
    /// Create a buffered request with a fresh correlation id.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            args: Vec::new(),
            cwd: None,
            project_id: None,
            stream: false,
        }
    }

    /// Set the CLI arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set an explicit working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the project identifier.
    #[must_use]
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Switch the request to streaming mode.
    #[must_use]
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Topic the terminal response is published on.
    #[must_use]
    pub fn response_topic(&self) -> String {
        ipc::response_topic(&self.id)
    }

    /// Topic stream chunks are published on.
    #[must_use]
    pub fn stream_topic(&self) -> String {
        ipc::stream_topic(&self.id)
    }
}

/// The single terminal outcome of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    /// Correlation id of the originating request.
    pub id: Uuid,

    /// Whether the execution produced a usable result.
    pub success: bool,

    /// Result text. Empty on failure.
    pub output: String,

    /// Failure message, rendered from the `ExecutionError`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Stable machine-readable failure kind (see `ExecutionError::kind`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    /// Token usage and cost, when the tool reported them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Wall-clock time the engine spent on the request, in milliseconds.
    pub duration_ms: u64,

    /// Session id that allows a later request to resume the conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ExecutionResponse {
    /// Build a successful response.
    pub fn success(
        id: Uuid,
        output: impl Into<String>,
        usage: Option<Usage>,
        session_id: Option<String>,
        duration: Duration,
    ) -> Self {
        Self {
            id,
            success: true,
            output: output.into(),
            error: None,
            error_kind: None,
            usage,
            duration_ms: duration_millis(duration),
            session_id,
        }
    }

    /// Build a failed response from an engine error.
    pub fn failure(id: Uuid, error: &ExecutionError, duration: Duration) -> Self {
        Self {
            id,
            success: false,
            output: String::new(),
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            usage: None,
            duration_ms: duration_millis(duration),
            session_id: None,
        }
    }

    /// Attach usage and session id to a failed response (tool-reported errors
    /// still carry billing information).
    #[must_use]
    pub fn with_details(mut self, usage: Option<Usage>, session_id: Option<String>) -> Self {
        self.usage = usage;
        self.session_id = session_id;
        self
    }
}

/// Kind of a stream message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamChunkKind {
    /// One line of tool output.
    Chunk,
    /// Output finished normally.
    End,
    /// Output finished with an error; `data` holds the message.
    Error,
}

/// One message on a request's stream topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunkEvent {
    /// Correlation id of the originating request.
    pub id: Uuid,
    /// Payload text (an output line, or the error message).
    pub data: String,
    /// Chunk, end or error marker.
    pub kind: StreamChunkKind,
}

impl StreamChunkEvent {
    /// A chunk carrying one output line.
    pub fn chunk(id: Uuid, data: impl Into<String>) -> Self {
        Self {
            id,
            data: data.into(),
            kind: StreamChunkKind::Chunk,
        }
    }

    /// The end-of-stream marker.
    pub fn end(id: Uuid) -> Self {
        Self {
            id,
            data: String::new(),
            kind: StreamChunkKind::End,
        }
    }

    /// The error marker.
    pub fn error(id: Uuid, message: impl Into<String>) -> Self {
        Self {
            id,
            data: message.into(),
            kind: StreamChunkKind::Error,
        }
    }

    /// True for end and error markers.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, StreamChunkKind::Chunk)
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format_is_camel_case() {
        let request = ExecutionRequest::new("hi")
            .with_project_id("p-1")
            .with_args(["--verbose"])
            .streaming();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["projectId"], "p-1");
        assert_eq!(json["stream"], true);
        assert_eq!(json["args"][0], "--verbose");
        assert!(json.get("cwd").is_none());
    }

    #[test]
    fn test_request_decodes_with_defaults() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"id":"{id}","prompt":"Say healthy"}}"#);
        let request: ExecutionRequest = serde_json::from_str(&raw).unwrap();

        assert_eq!(request.id, id);
        assert!(request.args.is_empty());
        assert!(!request.stream);
        assert!(request.cwd.is_none());
    }

    #[test]
    fn test_failure_response_carries_kind() {
        let id = Uuid::new_v4();
        let response =
            ExecutionResponse::failure(id, &ExecutionError::EmptyOutput, Duration::from_millis(12));

        assert!(!response.success);
        assert_eq!(response.error_kind.as_deref(), Some("empty_output"));
        assert_eq!(response.duration_ms, 12);
        assert!(response.output.is_empty());
    }

    #[test]
    fn test_private_topics_are_derived_from_id() {
        let request = ExecutionRequest::new("x");
        assert!(request.response_topic().ends_with(&request.id.to_string()));
        assert!(request.stream_topic().ends_with(&request.id.to_string()));
        assert_ne!(request.response_topic(), request.stream_topic());
    }

    #[test]
    fn test_stream_kind_serializes_lowercase() {
        let event = StreamChunkEvent::end(Uuid::new_v4());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "end");
        assert!(event.is_terminal());
        assert!(!StreamChunkEvent::chunk(event.id, "line").is_terminal());
    }
}
