//! Protocol translation between chat completions and the two upstream APIs.
//!
//! The core of the gateway: converts requests, single-shot responses and SSE
//! streams between the formats. All translation functions are pure (no I/O).

pub mod chat_types;
pub mod lenient;
pub mod messages_types;
pub mod reasoning;
pub mod request;
pub mod response;
pub mod responses_types;
pub mod streaming;

use serde::{Deserialize, Serialize};

/// Which upstream wire format a model speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    /// Messages API: system block list, optional thinking budget.
    #[serde(rename = "anthropic")]
    Messages,
    /// Responses API: flattened input items plus an instructions string.
    #[serde(rename = "openai")]
    Responses,
}

impl Vendor {
    /// Parse the `type` field of a model entry.
    #[must_use]
    pub fn from_type(model_type: &str) -> Option<Self> {
        match model_type {
            "anthropic" => Some(Self::Messages),
            "openai" => Some(Self::Responses),
            _ => None,
        }
    }

    /// Config name of this vendor, also the endpoint name it is served from.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "anthropic",
            Self::Responses => "openai",
        }
    }
}
