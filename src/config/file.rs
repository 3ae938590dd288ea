//! File-based configuration loading
//!
//! Loads the provider registry, alias table and request defaults from a JSON file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Alias every unknown or absent model name falls back to
pub const DEFAULT_ALIAS: &str = "default";

/// Environment variable pointing at an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "MODELGATE_CONFIG";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen host (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Values applied to optional request parameters the client left unset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDefaults {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub frequency_penalty: f32,

    #[serde(default)]
    pub presence_penalty: f32,

    /// Stream flag used when the client does not send one
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_stream() -> bool {
    true
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stream: default_stream(),
        }
    }
}

/// Gateway configuration loaded from JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server configuration (optional, defaults to 0.0.0.0:3000)
    #[serde(default)]
    pub server: ServerConfig,

    /// Request parameter defaults
    #[serde(default)]
    pub defaults: RequestDefaults,

    /// Provider configurations keyed by provider tag
    pub providers: HashMap<String, ProviderConfig>,

    /// Alias table keyed by the model name clients send
    pub aliases: HashMap<String, AliasConfig>,
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Base URL for the provider API, `/chat/completions` is appended
    pub base_url: String,

    /// Environment variable that overrides `base_url` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url_env: Option<String>,

    /// Inline API key (takes precedence over `api_key_env`)
    #[serde(default)]
    pub api_key: String,

    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Default request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Flat cost rate in currency units per million tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_million_tokens: Option<f64>,

    /// Daily spend cap; makes the provider metered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_budget: Option<f64>,
}

fn default_timeout_ms() -> u64 {
    180_000
}

/// Alias entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasConfig {
    /// Model id sent to the upstream provider
    pub model: String,

    /// Provider tag this alias is served by
    pub provider: String,

    /// Timeout override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Capability flags advertised for this alias
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub capabilities: BTreeSet<Capability>,
}

/// Capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Reasoning,
    Fast,
    Vision,
    Tools,
}

impl ProviderConfig {
    /// Default timeout as a duration
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve the credential: inline key first, then the named environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.trim().to_string());
        }

        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    /// Resolve the base URL, honouring `base_url_env`
    pub fn resolve_base_url(&self) -> String {
        self.base_url_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.base_url.clone())
    }
}

impl GatewayConfig {
    /// Load configuration from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {:?}", path);

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: GatewayConfig = serde_json::from_str(content)
            .with_context(|| "Failed to parse config JSON")?;

        config.validate()?;

        debug!("Loaded {} providers and {} aliases", config.providers.len(), config.aliases.len());
        Ok(config)
    }

    /// Load configuration from default locations
    /// Searches in order:
    /// 1. $MODELGATE_CONFIG
    /// 2. ~/.config/modelgate/modelgate.json
    /// 3. ./modelgate.json
    ///
    /// Returns error if no configuration file is found.
    pub fn load_default() -> Result<Self> {
        for candidate in Self::candidate_paths() {
            if candidate.exists() {
                return Self::load(&candidate);
            }
        }

        anyhow::bail!(
            "Configuration file not found. Please create one at:\n\
             - $MODELGATE_CONFIG\n\
             - ~/.config/modelgate/modelgate.json (recommended)\n\
             - ./modelgate.json (current directory)\n\
             \n\
             See modelgate.example.json for reference."
        )
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(explicit));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("modelgate").join("modelgate.json"));
        }
        paths.push(PathBuf::from("modelgate.json"));

        paths
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("At least one provider must be configured");
        }

        for (tag, provider) in &self.providers {
            if !provider.base_url.starts_with("http") {
                anyhow::bail!("Invalid base URL for provider '{}': {}", tag, provider.base_url);
            }

            if provider.timeout_ms == 0 {
                anyhow::bail!("Timeout for provider '{}' cannot be 0", tag);
            }

            if let Some(rate) = provider.cost_per_million_tokens {
                if !rate.is_finite() || rate < 0.0 {
                    anyhow::bail!("Cost rate for provider '{}' must be a non-negative number", tag);
                }
            }

            if let Some(cap) = provider.daily_budget {
                if !cap.is_finite() || cap < 0.0 {
                    anyhow::bail!("Daily budget for provider '{}' must be a non-negative number", tag);
                }
                if provider.cost_per_million_tokens.is_none() {
                    anyhow::bail!("Provider '{}' has a daily budget but no costPerMillionTokens", tag);
                }
            }
        }

        if !self.aliases.contains_key(DEFAULT_ALIAS) {
            anyhow::bail!("Alias table must contain a '{}' entry", DEFAULT_ALIAS);
        }

        for (alias, entry) in &self.aliases {
            if entry.model.trim().is_empty() {
                anyhow::bail!("Alias '{}' must have a target model", alias);
            }

            if !self.providers.contains_key(&entry.provider) {
                anyhow::bail!("Alias '{}' references unknown provider '{}'", alias, entry.provider);
            }

            if entry.timeout_ms == Some(0) {
                anyhow::bail!("Timeout override for alias '{}' cannot be 0", alias);
            }
        }

        Ok(())
    }
}
