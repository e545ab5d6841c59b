//! Wire types for the messages-style upstream API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

// ---------------------------------------------------------------------------
// Request types (what we send upstream)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub messages: Vec<MessagesMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system: Vec<SystemBlock>,
    pub max_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesMessage {
    pub role: MessagesRole,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagesRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemBlock {
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    Typed(TypedBlock),
    /// Already-typed caller part forwarded as is (images, unknown types).
    Passthrough(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedBlock {
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingConfig {
    #[serde(rename = "type")]
    pub thinking_type: String,
    pub budget_tokens: u64,
}

impl ThinkingConfig {
    #[must_use]
    pub fn enabled(budget_tokens: u64) -> Self {
        Self {
            thinking_type: "enabled".to_string(),
            budget_tokens,
        }
    }
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Typed(TypedBlock::Text { text: text.into() })
    }
}

// ---------------------------------------------------------------------------
// Response types (what comes back, decoded leniently)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesResponse {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub content: Vec<ResponseBlock>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub stop_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub usage: Option<MessagesUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseBlock {
    #[serde(rename = "type", default, deserialize_with = "lenient::or_default")]
    pub block_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesUsage {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub input_tokens: u64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub output_tokens: u64,
}

// ---------------------------------------------------------------------------
// Streaming events (what arrives on the upstream SSE stream)
// ---------------------------------------------------------------------------

/// The upstream stream events the transcoder distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagesStreamEvent {
    MessageStart,
    ContentBlockDelta { text: String },
    MessageDelta { stop_reason: Option<String> },
    MessageStop,
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ContentBlockDeltaPayload {
    #[serde(default, deserialize_with = "lenient::or_default")]
    delta: TextDelta,
}

#[derive(Debug, Default, Deserialize)]
struct TextDelta {
    #[serde(default, deserialize_with = "lenient::or_default")]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct MessageDeltaPayload {
    #[serde(default, deserialize_with = "lenient::or_default")]
    delta: StopDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StopDelta {
    #[serde(default, deserialize_with = "lenient::or_default")]
    stop_reason: Option<String>,
}

impl MessagesStreamEvent {
    /// Interpret a `data:` payload under the given event type.
    #[must_use]
    pub fn decode(event_type: &str, payload: Value) -> Self {
        match event_type {
            "message_start" => Self::MessageStart,
            "content_block_delta" => {
                let body: ContentBlockDeltaPayload = lenient::document(payload);
                Self::ContentBlockDelta {
                    text: body.delta.text,
                }
            }
            "message_delta" => {
                let body: MessageDeltaPayload = lenient::document(payload);
                Self::MessageDelta {
                    stop_reason: body.delta.stop_reason,
                }
            }
            "message_stop" => Self::MessageStop,
            _ => Self::Other,
        }
    }
}
