//! Model id → upstream route table, built once from configuration.

use std::collections::HashMap;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::translate::reasoning::ReasoningTier;
use crate::translate::Vendor;

/// Where a model is served and how requests for it are shaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoute {
    pub id: String,
    /// Display name; falls back to the id.
    pub name: String,
    pub vendor: Vendor,
    pub endpoint: String,
    pub reasoning: Option<ReasoningTier>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    routes: Vec<ModelRoute>,
    index: HashMap<String, usize>,
}

impl ModelRegistry {
    /// Every model must have a known type and an endpoint for that type.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let mut registry = Self::default();

        for model in &config.models {
            let vendor = Vendor::from_type(&model.model_type).ok_or_else(|| {
                GatewayError::config(format!(
                    "Model '{}' has unknown type '{}' (expected \"anthropic\" or \"openai\")",
                    model.id, model.model_type
                ))
            })?;

            let endpoint = config.endpoint(vendor.as_str()).ok_or_else(|| {
                GatewayError::config(format!(
                    "Model '{}' needs an endpoint named '{}'",
                    model.id,
                    vendor.as_str()
                ))
            })?;

            let reasoning = match model.reasoning.as_deref() {
                None => None,
                Some(value) => {
                    let tier = ReasoningTier::parse(value);
                    if tier.is_none() && !matches!(value.trim(), "" | "none" | "off") {
                        tracing::warn!(model = %model.id, reasoning = value, "ignoring unknown reasoning level");
                    }
                    tier
                }
            };

            if registry.index.contains_key(&model.id) {
                tracing::warn!(model = %model.id, "duplicate model entry; keeping the first");
                continue;
            }

            registry.index.insert(model.id.clone(), registry.routes.len());
            registry.routes.push(ModelRoute {
                id: model.id.clone(),
                name: model.name.clone().unwrap_or_else(|| model.id.clone()),
                vendor,
                endpoint: endpoint.url.clone(),
                reasoning,
            });
        }

        Ok(registry)
    }

    #[must_use]
    pub fn lookup(&self, model: &str) -> Option<&ModelRoute> {
        self.index.get(model).map(|&i| &self.routes[i])
    }

    /// All routes in configuration order.
    #[must_use]
    pub fn routes(&self) -> &[ModelRoute] {
        &self.routes
    }
}
