//! Thinking/reasoning budgets derived from a model's configured tier.
//!
//! The budget reserves tokens for upstream deliberation; the overall ceiling is
//! raised so the visible answer is never starved. Ceilings only ever grow.

use super::messages_types::ThinkingConfig;
use super::request::VendorRequest;

/// Extra room kept above the thinking budget for the final answer.
const ANSWER_HEADROOM: u64 = 4000;
/// Output ceiling used for reasoning models when the caller set none.
const RESPONSES_FLOOR: u64 = 4000;
const RESPONSES_MIN: u64 = 1000;
const RESPONSES_BUMP: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningTier {
    Low,
    Medium,
    High,
}

impl ReasoningTier {
    /// Parse a configured tier; `none`, empty and unknown values mean no tier.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    #[must_use]
    pub const fn budget_tokens(self) -> u64 {
        match self {
            Self::Low => 4096,
            Self::Medium => 12288,
            Self::High => 24576,
        }
    }

    #[must_use]
    pub const fn effort(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Adjust a translated request for the model's reasoning tier.
#[must_use]
pub fn apply_reasoning(tier: Option<ReasoningTier>, request: VendorRequest) -> VendorRequest {
    let Some(tier) = tier else {
        return request;
    };

    match request {
        VendorRequest::Messages(mut req) => {
            let budget = tier.budget_tokens();
            if req.max_tokens <= budget {
                req.max_tokens = budget + ANSWER_HEADROOM;
            }
            req.thinking = Some(ThinkingConfig::enabled(budget));
            VendorRequest::Messages(req)
        }
        VendorRequest::Responses(mut req) => {
            // Explicit effort makes the upstream spend the whole output budget on
            // deliberation, so only the ceiling is adjusted.
            tracing::debug!(effort = tier.effort(), "reasoning effort not attached");
            req.max_output_tokens = match req.max_output_tokens {
                None | Some(0) => Some(RESPONSES_FLOOR),
                Some(n) if n < RESPONSES_MIN => Some(n + RESPONSES_BUMP),
                other => other,
            };
            VendorRequest::Responses(req)
        }
    }
}
