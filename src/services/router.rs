//! Request Router
//!
//! Resolves a client model name to a descriptor and an authorized provider

use crate::config::{GatewayConfig, ProviderConfig};
use crate::services::aliases::{AliasRegistry, ModelAlias};
use crate::utils::error::{GatewayError, GatewayResult};
use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Provider API key
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Authorization header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Resolved provider configuration
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    /// Provider tag
    pub tag: String,
    /// API base URL
    pub base_url: String,
    /// Default request timeout
    pub default_timeout: Duration,
    /// Flat cost rate per million tokens
    pub cost_per_million: Option<f64>,
    /// Daily spend cap
    pub daily_budget: Option<f64>,
    credential: Option<Credential>,
    credential_env: Option<String>,
}

impl ProviderEndpoint {
    pub fn new(
        tag: impl Into<String>,
        base_url: impl Into<String>,
        credential: Option<Credential>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            tag: tag.into(),
            base_url: base_url.into(),
            default_timeout,
            cost_per_million: None,
            daily_budget: None,
            credential,
            credential_env: None,
        }
    }

    /// Resolve a provider entry from the configuration file
    pub fn from_config(tag: &str, config: &ProviderConfig) -> Self {
        Self {
            tag: tag.to_string(),
            base_url: config.resolve_base_url(),
            default_timeout: config.default_timeout(),
            cost_per_million: config.cost_per_million_tokens,
            daily_budget: config.daily_budget,
            credential: config.resolve_api_key().map(Credential::new),
            credential_env: config.api_key_env.clone(),
        }
    }

    /// Whether a credential is available
    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }

    /// Whether a daily cap applies
    pub fn is_metered(&self) -> bool {
        self.daily_budget.is_some()
    }

    /// Build the chat completions URL
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn missing_credential_error(&self) -> GatewayError {
        let message = match &self.credential_env {
            Some(env) => format!(
                "{} API key not configured. Set {} environment variable.",
                self.tag, env
            ),
            None => format!("{} API key not configured.", self.tag),
        };
        GatewayError::Configuration(message)
    }
}

/// Provider with a credential, ready for dispatch
#[derive(Debug, Clone, Copy)]
pub struct ProviderTarget<'a> {
    pub endpoint: &'a ProviderEndpoint,
    pub credential: &'a Credential,
}

/// Provider registry keyed by tag
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderEndpoint>,
}

impl ProviderRegistry {
    pub fn from_config(table: &HashMap<String, ProviderConfig>) -> Self {
        let mut registry = Self::default();
        for (tag, config) in table {
            registry.insert(ProviderEndpoint::from_config(tag, config));
        }
        registry
    }

    /// Register a provider, replacing any entry with the same tag
    pub fn insert(&mut self, endpoint: ProviderEndpoint) {
        if !endpoint.is_configured() {
            warn!("Provider '{}' has no API key configured", endpoint.tag);
        }
        self.providers.insert(endpoint.tag.clone(), endpoint);
    }

    pub fn get(&self, tag: &str) -> Option<&ProviderEndpoint> {
        self.providers.get(tag)
    }

    /// Resolve a provider for dispatch
    ///
    /// Fails when the provider has no credential.
    pub fn config_for(&self, tag: &str) -> GatewayResult<ProviderTarget<'_>> {
        let endpoint = self
            .providers
            .get(tag)
            .ok_or_else(|| GatewayError::Configuration(format!("Unknown provider '{}'", tag)))?;

        let credential = endpoint
            .credential
            .as_ref()
            .ok_or_else(|| endpoint.missing_credential_error())?;

        Ok(ProviderTarget { endpoint, credential })
    }

    /// All providers, sorted by tag
    pub fn endpoints(&self) -> Vec<&ProviderEndpoint> {
        let mut endpoints: Vec<&ProviderEndpoint> = self.providers.values().collect();
        endpoints.sort_by(|a, b| a.tag.cmp(&b.tag));
        endpoints
    }
}

/// Routing decision for one request
#[derive(Debug, Clone, Copy)]
pub struct Route<'a> {
    pub alias: &'a ModelAlias,
    pub provider: ProviderTarget<'a>,
    /// Alias override, else provider default
    pub timeout: Duration,
}

/// Model router
///
/// Holds the alias registry and the provider registry
#[derive(Debug, Clone)]
pub struct ModelRouter {
    aliases: AliasRegistry,
    providers: ProviderRegistry,
}

impl ModelRouter {
    /// Create a router, checking every alias points at a registered provider
    pub fn new(aliases: AliasRegistry, providers: ProviderRegistry) -> Result<Self> {
        for alias in aliases.entries() {
            if providers.get(&alias.provider).is_none() {
                anyhow::bail!("Alias '{}' references unknown provider '{}'", alias.key, alias.provider);
            }
        }

        info!(
            "Router initialized with {} aliases across {} providers",
            aliases.len(),
            providers.endpoints().len()
        );

        Ok(Self { aliases, providers })
    }

    /// Create a router from configuration
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let aliases = AliasRegistry::from_config(&config.aliases)?;
        let providers = ProviderRegistry::from_config(&config.providers);
        Self::new(aliases, providers)
    }

    /// Route a client model name
    pub fn route(&self, requested: Option<&str>) -> GatewayResult<Route<'_>> {
        let alias = self.aliases.resolve(requested);
        let provider = self.providers.config_for(&alias.provider)?;
        let timeout = effective_timeout(alias, provider.endpoint);

        debug!("Routed {:?} to provider '{}'", requested, alias.provider);

        Ok(Route { alias, provider, timeout })
    }

    pub fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }
}

/// Timeout precedence: alias override > provider default
pub fn effective_timeout(alias: &ModelAlias, endpoint: &ProviderEndpoint) -> Duration {
    alias.timeout.unwrap_or(endpoint.default_timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AliasConfig;
    use std::collections::BTreeSet;

    fn create_test_router(groq_key: Option<&str>) -> ModelRouter {
        let mut aliases = HashMap::new();
        aliases.insert("default".to_string(), AliasConfig {
            model: "llama-3.1-8b-instant".to_string(),
            provider: "groq".to_string(),
            timeout_ms: Some(30000),
            capabilities: BTreeSet::new(),
        });
        aliases.insert("llama-70b".to_string(), AliasConfig {
            model: "meta/llama-3.1-70b-instruct".to_string(),
            provider: "nvidia".to_string(),
            timeout_ms: None,
            capabilities: BTreeSet::new(),
        });

        let mut providers = ProviderRegistry::default();
        providers.insert(ProviderEndpoint::new(
            "groq",
            "https://api.groq.com/openai/v1/",
            groq_key.map(Credential::new),
            Duration::from_secs(60),
        ));
        providers.insert(ProviderEndpoint::new(
            "nvidia",
            "https://integrate.api.nvidia.com/v1",
            Some(Credential::new("nvapi-test")),
            Duration::from_secs(180),
        ));

        ModelRouter::new(AliasRegistry::from_config(&aliases).unwrap(), providers).unwrap()
    }

    #[test]
    fn test_route_uses_alias_timeout_override() {
        let router = create_test_router(Some("gsk-test"));

        let route = router.route(Some("default")).unwrap();
        assert_eq!(route.timeout, Duration::from_secs(30));
        assert_eq!(route.provider.endpoint.tag, "groq");
    }

    #[test]
    fn test_route_falls_back_to_provider_timeout() {
        let router = create_test_router(Some("gsk-test"));

        let route = router.route(Some("llama-70b")).unwrap();
        assert_eq!(route.timeout, Duration::from_secs(180));
        assert_eq!(route.alias.target, "meta/llama-3.1-70b-instruct");
    }

    #[test]
    fn test_missing_credential_is_configuration_error() {
        let router = create_test_router(None);

        let error = router.route(Some("unknown-model")).unwrap_err();
        assert_eq!(error.error_type(), "configuration_error");

        // Other providers are unaffected
        assert!(router.route(Some("llama-70b")).is_ok());
    }

    #[test]
    fn test_chat_completions_url() {
        let router = create_test_router(Some("gsk-test"));

        let groq = router.providers().get("groq").unwrap();
        assert_eq!(groq.chat_completions_url(), "https://api.groq.com/openai/v1/chat/completions");
    }

    #[test]
    fn test_credential_is_redacted() {
        let credential = Credential::new("super-secret");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(credential.bearer(), "Bearer super-secret");
    }

    #[test]
    fn test_unknown_provider_rejected_at_load() {
        let mut aliases = HashMap::new();
        aliases.insert("default".to_string(), AliasConfig {
            model: "m".to_string(),
            provider: "missing".to_string(),
            timeout_ms: None,
            capabilities: BTreeSet::new(),
        });

        let registry = AliasRegistry::from_config(&aliases).unwrap();
        assert!(ModelRouter::new(registry, ProviderRegistry::default()).is_err());
    }
}
