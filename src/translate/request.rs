//! Translate chat-completion requests into the two upstream request shapes.
//!
//! System messages are lifted out of the conversation: for the messages API they
//! become the `system` block list (after the configured persona), for the
//! responses API they are folded into the `instructions` string. Everything else
//! keeps its order.

use serde::Serialize;
use serde_json::Value;

use super::chat_types::{ChatCompletionRequest, ChatMessage, ContentPart, MessageContent, Role};
use super::messages_types::{ContentBlock, MessagesMessage, MessagesRequest, MessagesRole, SystemBlock};
use super::responses_types::{InputContent, InputItem, InputRole, ResponsesRequest, TypedInput};
use super::Vendor;
use crate::config::GatewayConfig;

/// A request body ready to be sent to one upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VendorRequest {
    Messages(MessagesRequest),
    Responses(ResponsesRequest),
}

impl VendorRequest {
    #[must_use]
    pub fn vendor(&self) -> Vendor {
        match self {
            Self::Messages(_) => Vendor::Messages,
            Self::Responses(_) => Vendor::Responses,
        }
    }
}

/// Builds upstream requests with the configured persona and token ceiling.
#[derive(Debug, Clone)]
pub struct RequestTranslator {
    system_prompt: String,
    default_max_tokens: u64,
}

impl RequestTranslator {
    pub fn new(system_prompt: impl Into<String>, default_max_tokens: u64) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            default_max_tokens,
        }
    }

    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.system_prompt.clone(), config.default_max_tokens)
    }

    /// Translate for the given vendor. Never fails; malformed parts are dropped.
    #[must_use]
    pub fn translate(&self, req: &ChatCompletionRequest, vendor: Vendor) -> VendorRequest {
        match vendor {
            Vendor::Messages => VendorRequest::Messages(self.to_messages(req)),
            Vendor::Responses => VendorRequest::Responses(self.to_responses(req)),
        }
    }

    #[must_use]
    pub fn to_messages(&self, req: &ChatCompletionRequest) -> MessagesRequest {
        let system = self
            .system_texts(req)
            .into_iter()
            .map(|text| SystemBlock::Text { text })
            .collect();

        let messages = req
            .messages
            .iter()
            .filter_map(|msg| {
                let role = match msg.role {
                    Role::User => MessagesRole::User,
                    Role::Assistant => MessagesRole::Assistant,
                    Role::System => return None,
                    Role::Other => {
                        tracing::debug!("dropping message with untranslatable role");
                        return None;
                    }
                };
                Some(MessagesMessage {
                    role,
                    content: content_blocks(msg),
                })
            })
            .collect();

        let max_tokens = match req.max_tokens {
            Some(n) if n > 0 => n,
            _ => self.default_max_tokens,
        };

        MessagesRequest {
            model: req.model.clone(),
            messages,
            system,
            max_tokens,
            temperature: req.temperature,
            stream: req.stream,
            thinking: None,
        }
    }

    #[must_use]
    pub fn to_responses(&self, req: &ChatCompletionRequest) -> ResponsesRequest {
        let instructions = self.system_texts(req).concat();

        let input = req
            .messages
            .iter()
            .filter_map(|msg| {
                let role = match msg.role {
                    Role::User => InputRole::User,
                    Role::Assistant => InputRole::Assistant,
                    Role::System => return None,
                    Role::Other => {
                        tracing::debug!("dropping message with untranslatable role");
                        return None;
                    }
                };
                Some(InputItem {
                    role,
                    content: input_contents(role, msg),
                })
            })
            .collect();

        ResponsesRequest {
            model: req.model.clone(),
            input,
            instructions: (!instructions.is_empty()).then_some(instructions),
            max_output_tokens: req.max_tokens.filter(|n| *n > 0),
            temperature: req.temperature,
            top_p: req.top_p,
            stream: req.stream,
            store: false,
            tools: req.tools.clone(),
            reasoning: None,
            presence_penalty: req.presence_penalty,
            frequency_penalty: req.frequency_penalty,
        }
    }

    /// Persona first, then every system message's text in order. Empty texts are skipped.
    fn system_texts(&self, req: &ChatCompletionRequest) -> Vec<String> {
        std::iter::once(self.system_prompt.clone())
            .chain(
                req.messages
                    .iter()
                    .filter(|m| m.role == Role::System)
                    .filter_map(|m| m.content.as_ref().map(MessageContent::text)),
            )
            .filter(|text| !text.is_empty())
            .collect()
    }
}

fn content_blocks(msg: &ChatMessage) -> Vec<ContentBlock> {
    match &msg.content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) => vec![ContentBlock::text(text.clone())],
        // The messages API speaks the same part vocabulary; forward every object untouched.
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Object(map) => Some(ContentBlock::Passthrough(map.clone())),
                ContentPart::Malformed(_) => {
                    tracing::debug!("dropping malformed content part");
                    None
                }
            })
            .collect(),
    }
}

fn input_contents(role: InputRole, msg: &ChatMessage) -> Vec<InputContent> {
    let text_block = |text: Value| {
        InputContent::Typed(match role {
            InputRole::User => TypedInput::InputText { text },
            InputRole::Assistant => TypedInput::OutputText { text },
        })
    };

    match &msg.content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) => vec![text_block(Value::from(text.as_str()))],
        // Re-tag on `type` alone; the payload field is copied whatever its shape.
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|part| {
                let ContentPart::Object(map) = part else {
                    tracing::debug!("dropping malformed content part");
                    return None;
                };
                let field = |key: &str| map.get(key).cloned().unwrap_or(Value::Null);
                Some(match part.part_type() {
                    Some("text") => text_block(field("text")),
                    Some("image_url") => {
                        let image_url = field("image_url");
                        InputContent::Typed(match role {
                            InputRole::User => TypedInput::InputImage { image_url },
                            InputRole::Assistant => TypedInput::OutputImage { image_url },
                        })
                    }
                    _ => InputContent::Passthrough(map.clone()),
                })
            })
            .collect(),
    }
}
