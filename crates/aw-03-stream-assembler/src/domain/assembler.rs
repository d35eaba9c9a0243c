//! # Result Assembler
//!
//! Folds an ordered sequence of tool output lines into one result.
//!
//! ## Precedence
//!
//! 1. A `result` event. Later ones replace earlier ones.
//! 2. Accumulated assistant text, in arrival order.
//! 3. The content payload of a `system` event, serialised.
//! 4. Otherwise `Parse("no result found")`.
//!
//! Text from (1) and (2) goes through `effective_output`: a reply that wraps
//! its JSON in a fenced ```` ```json ```` block yields the block's interior.

use aw_01_json_extract::{effective_output, extract_array};
use serde_json::Value;
use shared_types::{ExecutionError, Usage};
use tracing::debug;

use super::events::{StreamEvent, UsageReport};

/// Error message when the output held nothing usable.
pub const NO_RESULT: &str = "no result found";

/// What the tool produced, reconstructed.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledResult {
    pub output: String,
    pub session_id: Option<String>,
    pub usage: Option<Usage>,
    /// Duration reported by the tool itself.
    pub duration_ms: Option<u64>,
    /// The tool's own `result` event flagged an error.
    pub is_error: bool,
}

#[derive(Debug, Clone)]
struct FinalResult {
    text: String,
    is_error: bool,
    session_id: Option<String>,
}

/// Stateful, line-at-a-time assembler.
#[derive(Debug, Default)]
pub struct ResultAssembler {
    session_id: Option<String>,
    assistant_text: String,
    saw_assistant: bool,
    system_content: Option<Value>,
    usage: Option<Usage>,
    duration_ms: Option<u64>,
    result: Option<FinalResult>,
    skipped: usize,
}

impl ResultAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and observe one line. Lines that are not JSON are skipped.
    pub fn push_line(&mut self, line: &str) {
        match serde_json::from_str::<Value>(line.trim()) {
            Ok(value) => self.observe(&value),
            Err(_) => self.skipped += 1,
        }
    }

    /// Observe one parsed value.
    pub fn observe(&mut self, value: &Value) {
        let report = UsageReport::from_value(value);
        report.apply_to(&mut self.usage);
        if let Some(duration) = report.duration_ms() {
            self.duration_ms = Some(duration);
        }

        match StreamEvent::classify(value) {
            StreamEvent::System {
                session_id,
                content,
            } => {
                if session_id.is_some() {
                    self.session_id = session_id;
                }
                if content.is_some() {
                    self.system_content = content;
                }
            }
            StreamEvent::Assistant { text, .. } => {
                self.saw_assistant = true;
                self.assistant_text.push_str(&text);
            }
            StreamEvent::Result {
                text,
                is_error,
                session_id,
            } => {
                self.result = Some(FinalResult {
                    text,
                    is_error,
                    session_id,
                });
            }
            StreamEvent::Other => {}
        }
    }

    /// Number of lines that were not JSON.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Produce the result.
    ///
    /// # Errors
    ///
    /// `Parse` if no result, assistant text, or system content was seen.
    pub fn finish(self) -> Result<AssembledResult, ExecutionError> {
        if self.skipped > 0 {
            debug!(skipped = self.skipped, "Non-JSON output lines skipped");
        }

        if let Some(result) = self.result {
            return Ok(AssembledResult {
                output: effective_output(&result.text).into_owned(),
                session_id: result.session_id.or(self.session_id),
                usage: self.usage,
                duration_ms: self.duration_ms,
                is_error: result.is_error,
            });
        }

        if self.saw_assistant {
            return Ok(AssembledResult {
                output: effective_output(&self.assistant_text).into_owned(),
                session_id: self.session_id,
                usage: self.usage,
                duration_ms: self.duration_ms,
                is_error: false,
            });
        }

        if let Some(content) = self.system_content {
            let output = match content {
                Value::String(text) => text,
                other => other.to_string(),
            };
            return Ok(AssembledResult {
                output,
                session_id: self.session_id,
                usage: self.usage,
                duration_ms: self.duration_ms,
                is_error: false,
            });
        }

        Err(ExecutionError::Parse(NO_RESULT.to_string()))
    }
}

/// Assemble a complete output.
///
/// A lone line that opens with `[` is read as one array of events, using the
/// balanced-bracket scan so trailing noise after the array is tolerated.
///
/// # Errors
///
/// `Parse` if nothing usable was found.
pub fn assemble(lines: &[String]) -> Result<AssembledResult, ExecutionError> {
    let mut assembler = ResultAssembler::new();

    if let [only] = lines {
        if only.trim_start().starts_with('[') {
            if let Some(events) = extract_array(only)
                .and_then(|raw| serde_json::from_str::<Vec<Value>>(raw).ok())
            {
                for event in &events {
                    assembler.observe(event);
                }
                return assembler.finish();
            }
        }
    }

    for line in lines {
        assembler.push_line(line);
    }
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_result_event_is_authoritative() {
        let output = lines(&[
            r#"{"type":"system","subtype":"init","session_id":"sess-1"}"#,
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hello, "}]}}"#,
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"world"}]}}"#,
            r#"{"type":"result","subtype":"success","is_error":false,"result":"Hello, world"}"#,
        ]);

        let result = assemble(&output).unwrap();
        assert_eq!(result.output, "Hello, world");
        assert_eq!(result.session_id.as_deref(), Some("sess-1"));
        assert!(!result.is_error);
    }

    #[test]
    fn test_result_text_overrides_accumulated_text() {
        let output = lines(&[
            r#"{"type":"assistant","text":"draft"}"#,
            r#"{"type":"result","result":"final","session_id":"s-2"}"#,
        ]);
        let result = assemble(&output).unwrap();
        assert_eq!(result.output, "final");
        assert_eq!(result.session_id.as_deref(), Some("s-2"));
    }

    #[test]
    fn test_assistant_text_without_result() {
        let output = lines(&[
            r#"{"type":"assistant","content":[{"type":"text","text":"Hello, "}]}"#,
            r#"{"type":"assistant","content":[{"type":"text","text":"world"}]}"#,
        ]);
        let result = assemble(&output).unwrap();
        assert_eq!(result.output, "Hello, world");
        assert_eq!(result.session_id, None);
    }

    #[test]
    fn test_nothing_usable_is_parse_error() {
        let output = lines(&["starting up...", "not json {", r#"{"type":"user"}"#]);
        assert_eq!(
            assemble(&output),
            Err(ExecutionError::Parse(NO_RESULT.to_string()))
        );
        assert_eq!(assemble(&[]), Err(ExecutionError::Parse(NO_RESULT.to_string())));
    }

    #[test]
    fn test_unparsable_lines_are_skipped_individually() {
        let mut assembler = ResultAssembler::new();
        assembler.push_line("warning: something");
        assembler.push_line(r#"{"type":"result","result":"ok"}"#);
        assembler.push_line("{broken");
        assert_eq!(assembler.skipped(), 2);
        assert_eq!(assembler.finish().unwrap().output, "ok");
    }

    #[test]
    fn test_fenced_json_is_extracted_from_result() {
        let output = lines(&[
            r#"{"type":"result","result":"Here you go:\n```json\n{\"pages\": 3}\n```"}"#,
        ]);
        assert_eq!(assemble(&output).unwrap().output, r#"{"pages": 3}"#);
    }

    #[test]
    fn test_raw_json_result_left_alone() {
        let output = lines(&[r#"{"type":"result","result":"[1, 2]"}"#]);
        assert_eq!(assemble(&output).unwrap().output, "[1, 2]");
    }

    #[test]
    fn test_system_content_fallback() {
        let output = lines(&[
            r#"{"type":"system","session_id":"s-3","content":{"status":"ok"}}"#,
        ]);
        let result = assemble(&output).unwrap();
        assert_eq!(result.output, r#"{"status":"ok"}"#);
        assert_eq!(result.session_id.as_deref(), Some("s-3"));
    }

    #[test]
    fn test_single_line_array_of_events() {
        let output = lines(&[
            r#"[{"type":"system","session_id":"s-4"},{"type":"result","result":"from array"}] trailing"#,
        ]);
        let result = assemble(&output).unwrap();
        assert_eq!(result.output, "from array");
        assert_eq!(result.session_id.as_deref(), Some("s-4"));
    }

    #[test]
    fn test_usage_and_duration_collected_from_any_event() {
        let output = lines(&[
            r#"{"type":"assistant","message":{"content":"hi","usage":{"input_tokens":3,"output_tokens":1}}}"#,
            r#"{"type":"result","result":"hi","usage":{"input_tokens":12,"output_tokens":4},"total_cost_usd":0.5,"duration_ms":900}"#,
        ]);
        let result = assemble(&output).unwrap();
        let usage = result.usage.unwrap();
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.output_tokens, 4);
        assert_eq!(usage.cost_usd, Some(0.5));
        assert_eq!(result.duration_ms, Some(900));
    }

    #[test]
    fn test_tool_error_result_is_flagged() {
        let output = lines(&[
            r#"{"type":"result","subtype":"error_during_execution","is_error":true,"result":"quota exceeded"}"#,
        ]);
        let result = assemble(&output).unwrap();
        assert!(result.is_error);
        assert_eq!(result.output, "quota exceeded");
    }
}
