use crate::error::{GatewayError, Result};
use crate::headers::ForwardedHeaders;
use crate::proxy::{Gateway, ProxyResult};
use crate::translate::chat_types::{ChatCompletionRequest, ErrorResponse, ModelCard, ModelList};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub gateway: Gateway,
    /// Key callers must present as `Bearer <key>`; `None` accepts any bearer.
    pub proxy_key: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(gateway: Gateway, proxy_key: Option<String>) -> Self {
        Self {
            gateway,
            proxy_key,
            started_at: Utc::now(),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/v1/models", get(handle_models))
        .route("/v1/chat/completions", post(handle_chat_completions))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = authorize(&headers, state.proxy_key.as_deref()) {
        return e.into_response();
    }

    let req: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return GatewayError::invalid_input(format!("Invalid request body: {e}")).into_response();
        }
    };

    tracing::info!(
        model = %req.model,
        streaming = req.stream,
        messages = req.messages.len(),
        "chat completion request"
    );

    let forwarded = ForwardedHeaders::from_inbound(&headers);

    if req.stream {
        match state.gateway.proxy_streaming(&req, &forwarded).await {
            Ok(ProxyResult::Success(frames)) => sse_response(frames),
            Ok(failure) => relay_failure(failure),
            Err(e) => e.into_response(),
        }
    } else {
        match state.gateway.proxy_non_streaming(&req, &forwarded).await {
            Ok(ProxyResult::Success(resp)) => Json(resp).into_response(),
            Ok(failure) => relay_failure(failure),
            Err(e) => e.into_response(),
        }
    }
}

fn sse_response<S>(frames: S) -> Response
where
    S: futures::Stream<Item = Bytes> + Send + 'static,
{
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(frames.map(Ok::<_, Infallible>)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn relay_failure<T>(result: ProxyResult<T>) -> Response {
    match result {
        ProxyResult::Error(err, status) => (upstream_status(status), Json(err)).into_response(),
        ProxyResult::Verbatim(body, status) => {
            let content_type = if serde_json::from_slice::<serde::de::IgnoredAny>(&body).is_ok() {
                "application/json"
            } else {
                "text/plain; charset=utf-8"
            };
            Response::builder()
                .status(upstream_status(status))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        ProxyResult::Success(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

fn upstream_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

/// Check the caller's `Authorization` header.
fn authorize(headers: &HeaderMap, proxy_key: Option<&str>) -> Result<()> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| GatewayError::missing_credentials("Missing Authorization header"))?;

    let Some(expected) = proxy_key else {
        return Ok(());
    };

    let token = value.strip_prefix("Bearer ").ok_or_else(|| {
        GatewayError::missing_credentials("Authorization header must use the Bearer scheme")
    })?;

    if token == expected {
        Ok(())
    } else {
        Err(GatewayError::rejected_credentials("Invalid API key"))
    }
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "endpoints": {
            "chat_completions": "POST /v1/chat/completions",
            "models": "GET /v1/models",
            "health": "GET /health",
        },
    }))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let now = Utc::now();
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": now.to_rfc3339(),
        "uptime": (now - state.started_at).num_seconds(),
    }))
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    let created = state.started_at.timestamp();
    let data = state
        .gateway
        .registry()
        .routes()
        .iter()
        .map(|route| ModelCard {
            id: route.id.clone(),
            object: "model".to_string(),
            created,
            owned_by: "factory".to_string(),
        })
        .collect();

    Json(ModelList {
        object: "list".to_string(),
        data,
    })
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = ErrorResponse::new(self.error_type(), self.client_message());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_auth(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_missing_header_rejected() {
        let err = authorize(&HeaderMap::new(), None).unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.error_type(), "invalid_request_error");
    }

    #[test]
    fn test_any_bearer_accepted_without_proxy_key() {
        assert!(authorize(&with_auth("Bearer whatever"), None).is_ok());
    }

    #[test]
    fn test_proxy_key_enforced() {
        assert!(authorize(&with_auth("Bearer s3cret"), Some("s3cret")).is_ok());

        let err = authorize(&with_auth("Bearer wrong"), Some("s3cret")).unwrap_err();
        assert_eq!(err.error_type(), "authentication_error");

        let err = authorize(&with_auth("Basic abc"), Some("s3cret")).unwrap_err();
        assert_eq!(err.error_type(), "invalid_request_error");
    }

    #[test]
    fn test_error_response_status() {
        let resp = GatewayError::model_not_found("x").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = relay_failure::<()>(ProxyResult::Verbatim(Bytes::from_static(b"oops"), 503));
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    }
}
