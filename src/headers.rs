//! Outbound header composition.
//!
//! Only a fixed allow-list of client headers ever reaches upstream. Each vendor
//! gets its own defaults underneath them; the client's values win.

use std::collections::BTreeMap;

use axum::http::HeaderMap as InboundHeaders;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::GatewayConfig;
use crate::translate::Vendor;

/// Client headers copied through to upstream.
pub const FORWARDED_HEADERS: [&str; 10] = [
    "x-session-id",
    "x-assistant-message-id",
    "x-factory-client",
    "x-stainless-arch",
    "x-stainless-lang",
    "x-stainless-os",
    "x-stainless-runtime",
    "x-stainless-retry-count",
    "x-stainless-package-version",
    "x-stainless-runtime-version",
];

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_CLIENT: &str = "cli";

/// Client SDK fingerprint the responses upstream expects.
const STAINLESS_DEFAULTS: [(&str, &str); 7] = [
    ("x-stainless-arch", "x64"),
    ("x-stainless-lang", "js"),
    ("x-stainless-os", "MacOS"),
    ("x-stainless-runtime", "node"),
    ("x-stainless-retry-count", "0"),
    ("x-stainless-package-version", "5.23.2"),
    ("x-stainless-runtime-version", "v24.3.0"),
];

/// The allow-listed subset of an inbound request's headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardedHeaders(BTreeMap<&'static str, String>);

impl ForwardedHeaders {
    pub fn from_inbound(headers: &InboundHeaders) -> Self {
        let kept = FORWARDED_HEADERS
            .iter()
            .filter_map(|name| {
                let value = headers.get(*name)?.to_str().ok()?;
                Some((*name, value.to_string()))
            })
            .collect();
        Self(kept)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct HeaderComposer {
    user_agent: String,
}

impl HeaderComposer {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.user_agent.clone())
    }

    /// Full upstream header set. Never fails; illegal values are skipped.
    #[must_use]
    pub fn build(
        &self,
        vendor: Vendor,
        authorization: &str,
        forwarded: &ForwardedHeaders,
        streaming: bool,
    ) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert(&mut headers, "content-type", "application/json");
        insert(&mut headers, "user-agent", &self.user_agent);
        insert(&mut headers, "authorization", authorization);
        if let Some(value) = headers.get_mut(reqwest::header::AUTHORIZATION) {
            value.set_sensitive(true);
        }

        match vendor {
            Vendor::Messages => {
                insert(&mut headers, "anthropic-version", ANTHROPIC_VERSION);
                if streaming {
                    insert(&mut headers, "accept", "text/event-stream");
                }
                insert(&mut headers, "x-factory-client", DEFAULT_CLIENT);
            }
            Vendor::Responses => {
                insert(&mut headers, "x-api-provider", "azure_openai");
                insert(&mut headers, "x-factory-client", DEFAULT_CLIENT);
                for name in ["x-session-id", "x-assistant-message-id"] {
                    if forwarded.get(name).is_none() {
                        insert(&mut headers, name, &uuid::Uuid::new_v4().to_string());
                    }
                }
                for (name, value) in STAINLESS_DEFAULTS {
                    insert(&mut headers, name, value);
                }
            }
        }

        for (name, value) in forwarded.iter() {
            insert(&mut headers, name, value);
        }

        headers
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(_) => tracing::warn!(header = name, "skipping header with illegal value"),
    }
}
