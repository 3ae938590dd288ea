//! Alias registry
//!
//! Exact-match lookup from client model names to descriptors

use crate::config::{AliasConfig, Capability, DEFAULT_ALIAS};
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::debug;

/// Descriptor of a model alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAlias {
    /// Name clients use
    pub key: String,
    /// Provider-side model id, never exposed to clients
    pub target: String,
    /// Provider tag serving this alias
    pub provider: String,
    /// Timeout override, wins over the provider default
    pub timeout: Option<Duration>,
    /// Advertised capabilities
    pub capabilities: BTreeSet<Capability>,
}

impl ModelAlias {
    fn from_config(key: &str, config: &AliasConfig) -> Self {
        Self {
            key: key.to_string(),
            target: config.model.clone(),
            provider: config.provider.clone(),
            timeout: config.timeout_ms.map(Duration::from_millis),
            capabilities: config.capabilities.clone(),
        }
    }
}

/// Alias registry
///
/// Immutable after load. The `default` entry is guaranteed present.
#[derive(Debug, Clone)]
pub struct AliasRegistry {
    aliases: HashMap<String, ModelAlias>,
    default: ModelAlias,
}

impl AliasRegistry {
    /// Build the registry from the alias table
    pub fn from_config(table: &HashMap<String, AliasConfig>) -> Result<Self> {
        let mut aliases = HashMap::with_capacity(table.len());

        for (key, config) in table {
            if config.model.trim().is_empty() {
                anyhow::bail!("Alias '{}' must have a target model", key);
            }
            aliases.insert(key.clone(), ModelAlias::from_config(key, config));
        }

        let default = aliases
            .get(DEFAULT_ALIAS)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Alias table must contain a '{}' entry", DEFAULT_ALIAS))?;

        debug!("Alias registry loaded with {} entries", aliases.len());

        Ok(Self { aliases, default })
    }

    /// Resolve a client model name
    ///
    /// Absent or unknown names resolve to the `default` descriptor.
    pub fn resolve(&self, alias: Option<&str>) -> &ModelAlias {
        match alias.and_then(|name| self.aliases.get(name)) {
            Some(descriptor) => descriptor,
            None => {
                debug!("Model {:?} not in alias table, using '{}'", alias, DEFAULT_ALIAS);
                &self.default
            }
        }
    }

    /// All descriptors, sorted by alias
    pub fn entries(&self) -> Vec<&ModelAlias> {
        let mut entries: Vec<&ModelAlias> = self.aliases.values().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
