use serde_json::Value;

use super::chat_types::{ChatCompletionResponse, ChatUsage, Choice, ChoiceMessage, ErrorResponse, FinishReason};
use super::lenient;
use super::messages_types::MessagesResponse;
use super::responses_types::{ChatShapedResponse, ResponsesBody, ResponsesResponse};
use super::Vendor;
use crate::error::{GatewayError, Result};

const COMPLETION_OBJECT: &str = "chat.completion";
const ASSISTANT: &str = "assistant";

/// Translate one complete upstream JSON body into a chat completion.
/// Fails only when the body is not JSON; odd fields degrade to defaults.
pub fn transform_response(vendor: Vendor, model: &str, body: &[u8]) -> Result<ChatCompletionResponse> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| GatewayError::malformed_upstream(format!("upstream body is not JSON: {e}")))?;

    Ok(match vendor {
        Vendor::Messages => {
            let resp: MessagesResponse = lenient::document(value);
            messages_to_chat(&resp, model)
        }
        Vendor::Responses => responses_to_chat(ResponsesBody::classify(value), model),
    })
}

/// Fresh canonical completion id.
#[must_use]
pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

#[must_use]
pub fn messages_to_chat(resp: &MessagesResponse, model: &str) -> ChatCompletionResponse {
    // Extended thinking puts a non-text block ahead of the answer.
    let content = resp
        .content
        .iter()
        .filter(|b| b.block_type.as_deref().map_or(true, |t| t == "text"))
        .find_map(|b| b.text.clone())
        .unwrap_or_default();

    ChatCompletionResponse {
        id: non_empty_id(&resp.id),
        object: COMPLETION_OBJECT.to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage {
                role: ASSISTANT.to_string(),
                content,
            },
            finish_reason: Some(map_stop_reason(resp.stop_reason.as_deref())),
        }],
        usage: resp
            .usage
            .as_ref()
            .map(|u| ChatUsage::from_counts(u.input_tokens, u.output_tokens)),
    }
}

#[must_use]
pub fn responses_to_chat(body: ResponsesBody, model: &str) -> ChatCompletionResponse {
    match body {
        ResponsesBody::ChatShaped(resp) => chat_shaped_to_chat(resp, model),
        ResponsesBody::Native(resp) => native_to_chat(&resp, model),
    }
}

fn chat_shaped_to_chat(resp: ChatShapedResponse, model: &str) -> ChatCompletionResponse {
    let choices = resp
        .choices
        .into_iter()
        .enumerate()
        .map(|(index, choice)| {
            let message = choice.message.unwrap_or_default();
            Choice {
                index: u32::try_from(index).unwrap_or(u32::MAX),
                message: ChoiceMessage {
                    role: message.role.unwrap_or_else(|| ASSISTANT.to_string()),
                    content: message.content.unwrap_or_default(),
                },
                finish_reason: choice.finish_reason.as_deref().map(map_finish_reason),
            }
        })
        .collect();

    ChatCompletionResponse {
        id: non_empty_id(&resp.id),
        object: resp.object.unwrap_or_else(|| COMPLETION_OBJECT.to_string()),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices,
        usage: resp.usage.map(ChatUsage::from_chat_shaped),
    }
}

fn native_to_chat(resp: &ResponsesResponse, model: &str) -> ChatCompletionResponse {
    // Reasoning items are skipped; the message item may hold several text fragments.
    let content: String = resp
        .output
        .iter()
        .find(|item| item.item_type.as_deref() == Some("message"))
        .map(|item| item.content.iter().filter_map(|c| c.text.as_deref()).collect())
        .unwrap_or_default();

    let finish_reason = if resp.status.as_deref() == Some("incomplete") {
        FinishReason::Length
    } else {
        FinishReason::Stop
    };

    ChatCompletionResponse {
        id: non_empty_id(&resp.id),
        object: COMPLETION_OBJECT.to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage {
                role: ASSISTANT.to_string(),
                content,
            },
            finish_reason: Some(finish_reason),
        }],
        usage: resp
            .usage
            .as_ref()
            .map(|u| ChatUsage::from_counts(u.input_tokens, u.output_tokens)),
    }
}

/// Messages-API stop reason to a canonical finish reason.
#[must_use]
pub fn map_stop_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("max_tokens") => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

/// Chat-shaped finish reason normalised to the closed set.
#[must_use]
pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

/// Reshape an upstream error body into the canonical envelope.
///
/// Accepts `{"type":"error","error":{..}}` and `{"error":{..}}`. Returns `None`
/// when the body carries no `error.message`.
#[must_use]
pub fn upstream_error_to_chat(body: &[u8]) -> Option<ErrorResponse> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let error = value.get("error")?.as_object()?;
    let message = error.get("message")?.as_str()?;
    let error_type = error
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("upstream_error");
    let code = match error.get("code") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    Some(ErrorResponse::new(error_type, message).with_code(code))
}

fn non_empty_id(id: &str) -> String {
    if id.is_empty() {
        completion_id()
    } else {
        id.to_string()
    }
}
