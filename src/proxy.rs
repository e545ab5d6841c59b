use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::headers::{ForwardedHeaders, HeaderComposer};
use crate::registry::{ModelRegistry, ModelRoute};
use crate::translate::chat_types::{ChatCompletionRequest, ChatCompletionResponse, ErrorResponse};
use crate::translate::reasoning::apply_reasoning;
use crate::translate::request::RequestTranslator;
use crate::translate::response::{transform_response, upstream_error_to_chat};
use crate::translate::streaming::{spawn_bounded, transcode, STREAM_QUEUE_DEPTH};

use bytes::Bytes;
use tokio_stream::wrappers::ReceiverStream;

/// Outcome of one proxied request.
#[derive(Debug)]
pub enum ProxyResult<T> {
    Success(T),
    /// Upstream failed with an error body we could reshape.
    Error(ErrorResponse, u16),
    /// Upstream failed with a body we could not interpret; relayed as is.
    Verbatim(Bytes, u16),
}

/// Everything needed to serve requests: routes, translators and the HTTP client.
#[derive(Debug, Clone)]
pub struct Gateway {
    registry: ModelRegistry,
    translator: RequestTranslator,
    headers: HeaderComposer,
    client: reqwest::Client,
    upstream_auth: String,
}

impl Gateway {
    pub fn new(config: &GatewayConfig, client: reqwest::Client, upstream_key: &str) -> Result<Self> {
        Ok(Self {
            registry: ModelRegistry::from_config(config)?,
            translator: RequestTranslator::from_config(config),
            headers: HeaderComposer::from_config(config),
            client,
            upstream_auth: format!("Bearer {upstream_key}"),
        })
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn route(&self, model: &str) -> Result<&ModelRoute> {
        self.registry
            .lookup(model)
            .ok_or_else(|| GatewayError::model_not_found(model))
    }

    /// Forward a non-streaming request and translate the reply.
    pub async fn proxy_non_streaming(
        &self,
        req: &ChatCompletionRequest,
        forwarded: &ForwardedHeaders,
    ) -> Result<ProxyResult<ChatCompletionResponse>> {
        let route = self.route(&req.model)?;
        let response = self.send(route, req, forwarded, false).await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return upstream_failure(response, status).await;
        }

        let body = response.bytes().await.map_err(|e| {
            GatewayError::upstream_transport(format!("Failed to read response body: {e}"))
        })?;

        tracing::debug!(status, body_len = body.len(), "upstream response");

        let resp = transform_response(route.vendor, &route.id, &body)?;

        if let Some(usage) = &resp.usage {
            tracing::info!(
                model = %route.id,
                name = %route.name,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completed"
            );
        }

        Ok(ProxyResult::Success(resp))
    }

    /// Forward a streaming request; the returned stream is fed by its own task.
    pub async fn proxy_streaming(
        &self,
        req: &ChatCompletionRequest,
        forwarded: &ForwardedHeaders,
    ) -> Result<ProxyResult<ReceiverStream<Bytes>>> {
        let route = self.route(&req.model)?;
        let response = self.send(route, req, forwarded, true).await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return upstream_failure(response, status).await;
        }

        let frames = transcode(route.vendor, route.id.clone(), response.bytes_stream());
        Ok(ProxyResult::Success(spawn_bounded(frames, STREAM_QUEUE_DEPTH)))
    }

    async fn send(
        &self,
        route: &ModelRoute,
        req: &ChatCompletionRequest,
        forwarded: &ForwardedHeaders,
        streaming: bool,
    ) -> Result<reqwest::Response> {
        let body = apply_reasoning(route.reasoning, self.translator.translate(req, route.vendor));
        let headers = self
            .headers
            .build(route.vendor, &self.upstream_auth, forwarded, streaming);

        tracing::info!(
            url = %route.endpoint,
            model = %route.id,
            vendor = route.vendor.as_str(),
            streaming,
            "POST upstream"
        );

        self.client
            .post(&route.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::upstream_unreachable(format!("Request failed: {e}")))
    }
}

/// Turn a non-2xx upstream reply into a relayable outcome.
async fn upstream_failure<T>(response: reqwest::Response, status: u16) -> Result<ProxyResult<T>> {
    let body = response.bytes().await.map_err(|e| {
        GatewayError::upstream_transport(format!("Failed to read error body: {e}"))
    })?;

    let text = String::from_utf8_lossy(&body);
    tracing::warn!(status, body = truncate(&text, 300), "upstream error");

    Ok(match upstream_error_to_chat(&body) {
        Some(err) => ProxyResult::Error(err, status),
        None => ProxyResult::Verbatim(body, status),
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[test]
    fn test_unknown_model_is_not_found() {
        let config: GatewayConfig = toml::from_str(
            "[[endpoints]]\nname = \"anthropic\"\nurl = \"http://a\"\n\n[[models]]\nid = \"c\"\ntype = \"anthropic\"\n",
        )
        .unwrap();
        let gateway = Gateway::new(&config, reqwest::Client::new(), "k").unwrap();
        assert!(gateway.route("c").is_ok());
        let err = gateway.route("nope").unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
