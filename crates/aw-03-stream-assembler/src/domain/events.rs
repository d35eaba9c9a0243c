//! # Tool Event Model
//!
//! The tool emits one JSON value per line. Each value is classified by its
//! `type` discriminant into a `StreamEvent`; the text of an assistant event
//! is resolved from whichever of its known shapes is present.
//!
//! | `type` | Shape | Contributes |
//! |--------|-------|-------------|
//! | `system` | `session_id`, `content` | session id, fallback payload |
//! | `assistant` | `message.content[]` text blocks | text fragment |
//! | `assistant` | `content[]` text blocks | text fragment |
//! | `assistant` | `content: "<text>"` | text fragment |
//! | `assistant` | `text: "<text>"` | text fragment |
//! | `result` | `result`, `is_error`, `session_id` | authoritative result |
//! | anything else | | nothing (skipped) |
//!
//! Content blocks without a `type` count as text blocks when they carry
//! `text`. Usage and duration are read separately from every value, whatever
//! its type, and a malformed field only loses itself.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use shared_types::Usage;

/// One classified event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    System {
        session_id: Option<String>,
        content: Option<Value>,
    },
    Assistant {
        text: String,
        shape: AssistantShape,
    },
    Result {
        text: String,
        is_error: bool,
        session_id: Option<String>,
    },
    Other,
}

/// Which shape an assistant event's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantShape {
    MessageContent,
    ContentBlocks,
    ContentText,
    DirectText,
}

impl StreamEvent {
    /// Classify a parsed value. Unknown or malformed shapes become `Other`.
    #[must_use]
    pub fn classify(value: &Value) -> Self {
        match RawEvent::deserialize(value) {
            Ok(RawEvent::System(system)) => StreamEvent::System {
                session_id: system.session_id,
                content: system.content,
            },
            Ok(RawEvent::Assistant(assistant)) => match assistant.resolve() {
                Some((text, shape)) => StreamEvent::Assistant { text, shape },
                None => StreamEvent::Other,
            },
            Ok(RawEvent::Result(result)) => {
                let text = match (result.result, result.is_error) {
                    (Some(text), _) => text,
                    (None, true) => result.subtype.unwrap_or_else(|| "error".to_string()),
                    (None, false) => String::new(),
                };
                StreamEvent::Result {
                    text,
                    is_error: result.is_error,
                    session_id: result.session_id,
                }
            }
            Ok(RawEvent::Other) | Err(_) => StreamEvent::Other,
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawEvent {
    System(SystemEvent),
    Assistant(AssistantEvent),
    Result(ResultEvent),
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct SystemEvent {
    #[serde(default, alias = "sessionId")]
    session_id: Option<String>,
    #[serde(default)]
    content: Option<Value>,
}

#[derive(Deserialize)]
struct AssistantEvent {
    #[serde(default)]
    message: Option<AssistantMessage>,
    #[serde(default)]
    content: Option<AssistantContent>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<AssistantContent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AssistantContent {
    Blocks(Vec<ContentBlock>),
    Text(String),
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    text: Option<String>,
}

impl ContentBlock {
    fn into_text(self) -> Option<String> {
        match self.kind.as_deref() {
            None | Some("text") => self.text,
            Some(_) => None,
        }
    }
}

impl AssistantContent {
    fn text(self) -> Option<String> {
        match self {
            AssistantContent::Text(text) => Some(text),
            AssistantContent::Blocks(blocks) => {
                let texts: Vec<String> = blocks
                    .into_iter()
                    .filter_map(ContentBlock::into_text)
                    .collect();
                (!texts.is_empty()).then(|| texts.concat())
            }
        }
    }
}

impl AssistantEvent {
    fn resolve(self) -> Option<(String, AssistantShape)> {
        if let Some(text) = self.message.and_then(|m| m.content).and_then(AssistantContent::text)
        {
            return Some((text, AssistantShape::MessageContent));
        }
        if let Some(content) = self.content {
            let shape = match content {
                AssistantContent::Blocks(_) => AssistantShape::ContentBlocks,
                AssistantContent::Text(_) => AssistantShape::ContentText,
            };
            if let Some(text) = content.text() {
                return Some((text, shape));
            }
        }
        self.text.map(|text| (text, AssistantShape::DirectText))
    }
}

#[derive(Deserialize)]
struct ResultEvent {
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    is_error: bool,
    #[serde(default, alias = "sessionId")]
    session_id: Option<String>,
}

// ============================================================================
// Usage and duration, read from any event
// ============================================================================

/// Usage-bearing fields an event may carry, at the top level or under
/// `message`.
#[derive(Debug, Default, Deserialize)]
pub struct UsageReport {
    #[serde(default, deserialize_with = "lenient")]
    usage: Option<RawUsage>,
    #[serde(default, deserialize_with = "lenient")]
    message: Option<MessageUsage>,
    #[serde(default, deserialize_with = "lenient")]
    total_cost_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    cost_usd: Option<f64>,
    #[serde(default, deserialize_with = "millis")]
    duration_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageUsage {
    #[serde(default, deserialize_with = "lenient")]
    usage: Option<RawUsage>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUsage {
    #[serde(default, deserialize_with = "lenient")]
    input_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    output_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    cache_read_input_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    cache_creation_input_tokens: Option<u64>,
}

/// Present and well-typed, or `None`. Never fails the enclosing value.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Whole milliseconds; fractional values are truncated.
fn millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms as u64)
    }))
}

impl UsageReport {
    /// Read the usage fields of a value; values without any yield an empty
    /// report.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self::deserialize(value).unwrap_or_default()
    }

    /// Reported duration, if any.
    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Overwrite the fields of `usage` that this report carries. Creates the
    /// usage value on first report.
    pub fn apply_to(&self, usage: &mut Option<Usage>) {
        let tokens = self
            .usage
            .as_ref()
            .or_else(|| self.message.as_ref().and_then(|m| m.usage.as_ref()));
        let cost = self.total_cost_usd.or(self.cost_usd);

        let carries_tokens = tokens.is_some_and(|t| {
            t.input_tokens.is_some()
                || t.output_tokens.is_some()
                || t.cache_read_input_tokens.is_some()
                || t.cache_creation_input_tokens.is_some()
        });
        if !carries_tokens && cost.is_none() {
            return;
        }

        let target = usage.get_or_insert_with(Usage::default);
        if let Some(t) = tokens {
            if let Some(n) = t.input_tokens {
                target.input_tokens = n;
            }
            if let Some(n) = t.output_tokens {
                target.output_tokens = n;
            }
            if t.cache_read_input_tokens.is_some() {
                target.cache_read_input_tokens = t.cache_read_input_tokens;
            }
            if t.cache_creation_input_tokens.is_some() {
                target.cache_creation_input_tokens = t.cache_creation_input_tokens;
            }
        }
        if cost.is_some() {
            target.cost_usd = cost;
        }
    }
}
