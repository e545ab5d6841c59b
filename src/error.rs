//! Error types for the gateway.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request: {message}")]
    InvalidInput { message: String },

    #[error("Model '{model}' not found")]
    ModelNotFound { model: String },

    #[error("{message}")]
    Unauthorized { message: String, error_type: &'static str },

    #[error("Upstream unreachable: {message}")]
    UpstreamUnreachable { message: String },

    #[error("Upstream transport error: {message}")]
    UpstreamTransport { message: String },

    #[error("Malformed upstream response: {message}")]
    MalformedUpstream { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GatewayError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn model_not_found(model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            model: model.into(),
        }
    }

    /// Missing or malformed credentials.
    pub fn missing_credentials(msg: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: msg.into(),
            error_type: "invalid_request_error",
        }
    }

    /// Credentials present but rejected.
    pub fn rejected_credentials(msg: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: msg.into(),
            error_type: "authentication_error",
        }
    }

    pub fn upstream_unreachable(msg: impl Into<String>) -> Self {
        Self::UpstreamUnreachable {
            message: msg.into(),
        }
    }

    pub fn upstream_transport(msg: impl Into<String>) -> Self {
        Self::UpstreamTransport {
            message: msg.into(),
        }
    }

    pub fn malformed_upstream(msg: impl Into<String>) -> Self {
        Self::MalformedUpstream {
            message: msg.into(),
        }
    }

    /// HTTP status the caller sees for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::ModelNotFound { .. } => 404,
            Self::UpstreamUnreachable { .. } | Self::UpstreamTransport { .. } => 502,
            Self::Config { .. }
            | Self::MalformedUpstream { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Toml(_) => 500,
        }
    }

    /// Value of `error.type` in the outgoing error envelope.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } | Self::ModelNotFound { .. } => "invalid_request_error",
            Self::Unauthorized { error_type, .. } => *error_type,
            Self::UpstreamUnreachable { .. } | Self::UpstreamTransport { .. } => "upstream_error",
            Self::Config { .. }
            | Self::MalformedUpstream { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Toml(_) => "server_error",
        }
    }

    /// Message safe to show the caller. Server-side failures never leak detail.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::MalformedUpstream { .. } => "Failed to parse upstream response".to_string(),
            Self::Config { .. } | Self::Io(_) | Self::Json(_) | Self::Toml(_) => {
                "Server configuration error".to_string()
            }
            Self::UpstreamUnreachable { .. } => "Request to upstream failed".to_string(),
            Self::UpstreamTransport { .. } => "Failed to read upstream response".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
