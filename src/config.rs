use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "chat-bridge.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Persona text placed ahead of any caller-supplied system content.
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Ceiling used for messages-style requests that carry no `max_tokens`.
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u64,
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Env var holding the credential sent upstream.
    #[serde(default = "default_upstream_key_env")]
    pub upstream_key_env: String,
    /// Env var holding the key callers must present. Unset means any bearer is accepted.
    #[serde(default = "default_proxy_key_env")]
    pub proxy_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Vendor type this endpoint serves ("anthropic" or "openai").
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub model_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

fn default_port() -> u16 {
    8000
}

fn default_user_agent() -> String {
    "factory-cli/0.19.3".to_string()
}

fn default_max_tokens() -> u64 {
    64_000
}

fn default_upstream_timeout_secs() -> u64 {
    300
}

fn default_upstream_key_env() -> String {
    "FACTORY_API_KEY".to_string()
}

fn default_proxy_key_env() -> String {
    "PROXY_API_KEY".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            upstream_key_env: default_upstream_key_env(),
            proxy_key_env: default_proxy_key_env(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            system_prompt: String::new(),
            user_agent: default_user_agent(),
            default_max_tokens: default_max_tokens(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            auth: AuthConfig::default(),
            endpoints: Vec::new(),
            models: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg / `CONFIG_PATH` > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        let candidates = config_search_paths();
        for candidate in &candidates {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(candidate);
            }
        }

        Err(GatewayError::config(format!(
            "No config file found. Searched: {}",
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    /// Resolve the upstream credential from its environment variable.
    pub fn resolve_upstream_key(&self) -> Result<String> {
        std::env::var(&self.auth.upstream_key_env)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                GatewayError::config(format!(
                    "Environment variable '{}' not set. Set it to the upstream API key.",
                    self.auth.upstream_key_env
                ))
            })
    }

    /// The key inbound callers must present, if one is configured.
    #[must_use]
    pub fn resolve_proxy_key(&self) -> Option<String> {
        std::env::var(&self.auth.proxy_key_env)
            .ok()
            .filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn endpoint(&self, name: &str) -> Option<&EndpointConfig> {
        self.endpoints.iter().find(|e| e.name == name)
    }
}

#[must_use]
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];

    if cfg!(target_os = "macos") {
        if let Some(home) = home_dir() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join("chat-bridge")
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("chat-bridge").join("config.toml"));
        }
        if let Some(home) = home_dir() {
            paths.push(home.join(".config").join("chat-bridge").join("config.toml"));
        }
    }

    if let Some(home) = home_dir() {
        paths.push(home.join(".chat-bridge.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 9000
system_prompt = "You are Droid."

[auth]
upstream_key_env = "MY_UPSTREAM_KEY"

[[endpoints]]
name = "anthropic"
url = "https://upstream.example/api/llm/a/v1/messages"

[[models]]
id = "claude-opus"
type = "anthropic"
reasoning = "high"

[[models]]
id = "gpt-5"
type = "openai"
"#
        )
        .unwrap();

        let config = GatewayConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.system_prompt, "You are Droid.");
        assert_eq!(config.user_agent, "factory-cli/0.19.3");
        assert_eq!(config.default_max_tokens, 64_000);
        assert_eq!(config.auth.upstream_key_env, "MY_UPSTREAM_KEY");
        assert_eq!(config.auth.proxy_key_env, "PROXY_API_KEY");
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[0].reasoning.as_deref(), Some("high"));
        assert_eq!(config.models[1].reasoning, None);
        assert!(config.endpoint("anthropic").is_some());
        assert!(config.endpoint("openai").is_none());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let f = NamedTempFile::new().unwrap();
        let config = GatewayConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 8000);
        assert!(config.models.is_empty());
        assert_eq!(config.upstream_timeout_secs, 300);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = GatewayConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, GatewayError::Config { .. }));
    }

    #[test]
    fn test_search_paths_start_with_cwd() {
        let paths = config_search_paths();
        assert_eq!(paths[0], PathBuf::from("chat-bridge.toml"));
    }
}
