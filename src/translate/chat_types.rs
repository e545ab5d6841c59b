//! Type definitions for the [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat).
//!
//! This is the canonical shape callers speak: the request we accept, the
//! response and streaming chunks we return, and the error envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

// ---------------------------------------------------------------------------
// Request types (what callers send TO us)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Any role we do not translate (tool, function, developer, ...).
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One element of a part-list message body.
///
/// Parts are kept as the caller sent them so that keys we do not model
/// (`cache_control` and friends) survive translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Object(Map<String, Value>),
    /// Not an object at all; dropped during translation.
    Malformed(Value),
}

impl ContentPart {
    /// The part's `type` tag, when it has a string one.
    #[must_use]
    pub fn part_type(&self) -> Option<&str> {
        match self {
            Self::Object(map) => map.get("type").and_then(Value::as_str),
            Self::Malformed(_) => None,
        }
    }

    /// Text of a `text` part; `None` for other parts or a non-string `text`.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Object(map) if self.part_type() == Some("text") => {
                map.get("text").and_then(Value::as_str)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Response types (what we send BACK)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChoiceMessage,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    pub content: String,
}

/// The only two completion signals callers ever see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Length,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatUsage {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub prompt_tokens: u64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub completion_tokens: u64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub total_tokens: u64,
    /// Extra upstream keys such as `prompt_tokens_details`.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ChatUsage {
    #[must_use]
    pub fn from_counts(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            details: Map::new(),
        }
    }

    /// Usage from an already chat-shaped upstream reply. Keys beyond the three
    /// counters are kept as sent; a missing total is recomputed.
    #[must_use]
    pub fn from_chat_shaped(mut raw: Map<String, Value>) -> Self {
        let mut count = |key: &str| raw.remove(key).and_then(|v| v.as_u64());
        let prompt_tokens = count("prompt_tokens").unwrap_or(0);
        let completion_tokens = count("completion_tokens").unwrap_or(0);
        let total_tokens = count("total_tokens")
            .unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens));
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
            details: raw,
        }
    }
}

// ---------------------------------------------------------------------------
// Streaming chunk types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// Model listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelCard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCard {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

// ---------------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                error_type: error_type.to_string(),
                code: None,
            },
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.error.code = code;
        self
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl MessageContent {
    /// Concatenated text of the content; non-text parts contribute nothing.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::text)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_with_mixed_parts() {
        let req: ChatCompletionRequest = serde_json::from_str(
            r#"{
                "model": "m1",
                "messages": [
                    {"role": "user", "content": [
                        {"type": "text", "text": "look"},
                        {"type": "image_url", "image_url": {"url": "data:image/png;base64,AA"}},
                        {"type": "input_audio", "input_audio": {"data": "x"}},
                        42
                    ]},
                    {"role": "tool", "content": "ignored"}
                ],
                "temperature": 0
            }"#,
        )
        .unwrap();

        assert!(!req.stream);
        assert_eq!(req.temperature, Some(0.0));
        assert_eq!(req.messages[1].role, Role::Other);

        let Some(MessageContent::Parts(parts)) = &req.messages[0].content else {
            panic!("expected parts");
        };
        assert_eq!(parts[0].text(), Some("look"));
        assert_eq!(parts[1].part_type(), Some("image_url"));
        assert_eq!(parts[2].part_type(), Some("input_audio"));
        assert!(matches!(parts[3], ContentPart::Malformed(_)));
    }

    #[test]
    fn test_chunk_serialises_null_finish_reason() {
        let chunk = ChatCompletionChunk {
            id: "chatcmpl-1".to_string(),
            object: "chat.completion.chunk".to_string(),
            created: 1,
            model: "m".to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: Some("assistant".to_string()),
                    content: None,
                },
                finish_reason: None,
            }],
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["choices"][0]["finish_reason"], Value::Null);
        assert_eq!(json["choices"][0]["delta"], serde_json::json!({"role": "assistant"}));
    }

    #[test]
    fn test_content_text_joins_parts() {
        let content: MessageContent = serde_json::from_value(serde_json::json!([
            {"type": "text", "text": "a"},
            {"type": "image_url", "image_url": null},
            {"type": "text", "text": 7},
            {"type": "text", "text": "b", "cache_control": {"type": "ephemeral"}}
        ]))
        .unwrap();
        assert_eq!(content.text(), "ab");
    }

    #[test]
    fn test_usage_totals_saturate() {
        let usage = ChatUsage::from_counts(u64::MAX, 1);
        assert_eq!(usage.total_tokens, u64::MAX);
    }

    #[test]
    fn test_chat_shaped_usage_keeps_details() {
        let raw = serde_json::json!({
            "prompt_tokens": 2,
            "completion_tokens": 3,
            "prompt_tokens_details": {"cached_tokens": 1}
        });
        let Value::Object(raw) = raw else { unreachable!() };
        let usage = ChatUsage::from_chat_shaped(raw);
        assert_eq!(usage.total_tokens, 5);
        assert_eq!(
            serde_json::to_value(&usage).unwrap(),
            serde_json::json!({
                "prompt_tokens": 2,
                "completion_tokens": 3,
                "total_tokens": 5,
                "prompt_tokens_details": {"cached_tokens": 1}
            })
        );
    }
}
