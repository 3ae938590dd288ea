//! Runtime settings
//!
//! Process-level knobs read from the environment (logging, limits, streaming grace)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Port override for the listen address (`PORT`)
    pub port_override: Option<u16>,
    /// Request configuration
    pub request: RequestConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Maximum request size in bytes
    pub max_request_size: usize,
    /// Extra time granted to a streaming relay past its effective timeout, in seconds
    pub stream_grace_secs: u64,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Whether CORS is enabled
    pub cors_enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (text/json)
    pub format: String,
}

impl Settings {
    /// Create a new settings instance from the environment
    pub fn new() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let port_override = match std::env::var("PORT") {
            Ok(port) => Some(port.parse().context("Invalid port number")?),
            Err(_) => None,
        };

        let settings = Self {
            port_override,
            request: RequestConfig {
                max_request_size: get_env_or_default("MAX_REQUEST_SIZE", "10485760")
                    .parse()
                    .context("Invalid maximum request size")?,
                stream_grace_secs: get_env_or_default("STREAM_GRACE_SECS", "10")
                    .parse()
                    .context("Invalid stream grace period")?,
            },
            security: SecurityConfig {
                cors_enabled: get_env_or_default("CORS_ENABLED", "true")
                    .parse()
                    .context("Invalid CORS enabled flag")?,
            },
            logging: LoggingConfig {
                level: std::env::var("LOG_LEVEL")
                    .unwrap_or_else(|_| get_env_or_default("RUST_LOG", "info")),
                format: get_env_or_default("LOG_FORMAT", "text"),
            },
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    fn validate(&self) -> Result<()> {
        if self.port_override == Some(0) {
            anyhow::bail!("Port number cannot be 0");
        }

        if self.request.max_request_size == 0 {
            anyhow::bail!("Maximum request size cannot be 0");
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        Ok(())
    }

    /// Grace period added to the effective timeout to arm the stream watchdog
    pub fn stream_grace(&self) -> Duration {
        Duration::from_secs(self.request.stream_grace_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port_override: None,
            request: RequestConfig {
                max_request_size: 10 * 1024 * 1024,
                stream_grace_secs: 10,
            },
            security: SecurityConfig { cors_enabled: true },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

/// Get environment variable or default value
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.stream_grace(), Duration::from_secs(10));
        assert_eq!(settings.request.max_request_size, 10 * 1024 * 1024);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut settings = Settings::default();
        settings.logging.format = "xml".to_string();

        assert!(settings.validate().is_err());
    }
}
