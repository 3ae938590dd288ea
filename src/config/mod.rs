//! Configuration management module
//!
//! Responsible for loading the gateway configuration file and runtime settings from the environment.

pub mod file;
pub mod settings;

pub use file::{
    AliasConfig, Capability, GatewayConfig, ProviderConfig, RequestDefaults, ServerConfig,
    DEFAULT_ALIAS,
};
pub use settings::Settings;
