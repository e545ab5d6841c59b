//! Wire types for the responses-style upstream API.
//!
//! Upstream replies arrive in one of two shapes: already chat-completion
//! shaped (`choices`), or native (`output` items). Both are modelled here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

// ---------------------------------------------------------------------------
// Request types (what we send upstream)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: Vec<InputItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    /// Server-side conversation storage; always off.
    pub store: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputItem {
    pub role: InputRole,
    pub content: Vec<InputContent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputContent {
    Typed(TypedInput),
    Passthrough(Map<String, Value>),
}

/// Content tags depend on who authored the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedInput {
    /// `text` is copied from the caller's part as is.
    InputText { text: Value },
    OutputText { text: Value },
    InputImage { image_url: Value },
    OutputImage { image_url: Value },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    pub effort: String,
    pub summary: String,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A non-streaming upstream reply, classified by shape.
#[derive(Debug, Clone)]
pub enum ResponsesBody {
    ChatShaped(ChatShapedResponse),
    Native(ResponsesResponse),
}

impl ResponsesBody {
    /// Anything with a non-empty `choices` array is treated as chat shaped.
    #[must_use]
    pub fn classify(value: Value) -> Self {
        let chat_shaped = value
            .get("choices")
            .and_then(Value::as_array)
            .is_some_and(|choices| !choices.is_empty());

        if chat_shaped {
            Self::ChatShaped(lenient::document(value))
        } else {
            Self::Native(lenient::document(value))
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatShapedResponse {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub object: Option<String>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub choices: Vec<ChatShapedChoice>,
    /// Kept raw so upstream detail keys reach the caller.
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub usage: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatShapedChoice {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub message: Option<ChatShapedMessage>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatShapedMessage {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsesResponse {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub output: Vec<OutputItem>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub usage: Option<ResponsesUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type", default, deserialize_with = "lenient::or_default")]
    pub item_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub content: Vec<OutputContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputContent {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsesUsage {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub input_tokens: u64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub output_tokens: u64,
}

// ---------------------------------------------------------------------------
// Streaming events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsesStreamEvent {
    Created,
    OutputTextDelta { text: String },
    Done { status: Option<String> },
    Incomplete,
    /// Reasoning summaries, item/part lifecycle and progress notices.
    Ignored,
}

#[derive(Debug, Default, Deserialize)]
struct TextDeltaPayload {
    #[serde(default, deserialize_with = "lenient::or_default")]
    delta: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DonePayload {
    #[serde(default, deserialize_with = "lenient::or_default")]
    response: DoneResponse,
}

#[derive(Debug, Default, Deserialize)]
struct DoneResponse {
    #[serde(default, deserialize_with = "lenient::or_default")]
    status: Option<String>,
}

impl ResponsesStreamEvent {
    /// Interpret a native `data:` payload under the given event type.
    #[must_use]
    pub fn decode(event_type: &str, payload: Value) -> Self {
        match event_type {
            "response.created" => Self::Created,
            "response.output_text.delta" => {
                let body: TextDeltaPayload = lenient::document(payload);
                Self::OutputTextDelta {
                    text: body.delta.or(body.text).unwrap_or_default(),
                }
            }
            "response.done" | "response.completed" => {
                let body: DonePayload = lenient::document(payload);
                Self::Done {
                    status: body.response.status,
                }
            }
            "response.incomplete" => Self::Incomplete,
            _ => Self::Ignored,
        }
    }
}
