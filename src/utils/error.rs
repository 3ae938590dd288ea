//! Error handling module
//!
//! Classifies every failure of the dispatch pipeline and renders it as the
//! published `{ "error": { message, type, code } }` envelope

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed or incomplete client request
    #[error("{0}")]
    InvalidRequest(String),

    /// Provider is not usable with the current configuration
    #[error("{0}")]
    Configuration(String),

    /// Daily budget of a metered provider is exhausted
    #[error("Daily budget exhausted for provider '{provider}', please try again tomorrow")]
    RateLimit { provider: String },

    /// Upstream did not answer within the effective timeout
    #[error("Request timeout after {}ms", .timeout.as_millis())]
    UpstreamTimeout { timeout: Duration },

    /// Upstream failed: HTTP status >= 400 or a transport failure
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    /// Anything unanticipated
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error envelope returned to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable message
    pub message: String,
    /// Error type
    #[serde(rename = "type")]
    pub error_type: String,
    /// HTTP status code
    pub code: u16,
}

impl ErrorEnvelope {
    /// Build an envelope for an arbitrary status, used outside the dispatch pipeline
    pub fn new(message: impl Into<String>, error_type: impl Into<String>, status: StatusCode) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                error_type: error_type.into(),
                code: status.as_u16(),
            },
        }
    }
}

impl GatewayError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::Configuration(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "invalid_request_error",
            GatewayError::Configuration(_) => "configuration_error",
            GatewayError::RateLimit { .. } => "rate_limit_error",
            GatewayError::UpstreamTimeout { .. } => "timeout_error",
            GatewayError::Upstream { .. } => "api_error",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    /// Whether the failure originates on the server side
    pub fn is_server_fault(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Convert to the published error envelope
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.to_string(), self.error_type(), self.status_code())
    }

    /// Classify a transport-level failure from the HTTP client
    ///
    /// Timeouts are recognised by the error kind, not by the message.
    pub fn from_transport(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            GatewayError::UpstreamTimeout { timeout }
        } else if error.is_connect() {
            GatewayError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: format!("Failed to connect to upstream: {}", error),
            }
        } else if error.is_decode() {
            GatewayError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: format!("Invalid response from upstream: {}", error),
            }
        } else {
            GatewayError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: format!("Upstream request failed: {}", error),
            }
        }
    }

    /// Build an upstream error from a status >= 400 and its raw payload
    ///
    /// The message is taken from `error.message`, then `message`, and falls
    /// back to a generic text.
    pub fn from_upstream_status(status: StatusCode, payload: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(payload)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/error/message")
                    .or_else(|| value.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "API request failed".to_string());

        GatewayError::Upstream { status, message }
    }
}

impl From<anyhow::Error> for GatewayError {
    fn from(error: anyhow::Error) -> Self {
        GatewayError::Internal(format!("{:#}", error))
    }
}

/// Implement IntoResponse trait to allow errors to be returned directly as HTTP responses
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_server_fault() {
            tracing::error!("Gateway error: {} - Status code: {}", self, status);
        } else {
            tracing::warn!("Client error: {} ({}) - Status code: {}", self, self.error_type(), status);
        }

        (status, Json(self.to_envelope())).into_response()
    }
}

/// Result type alias
pub type GatewayResult<T> = Result<T, GatewayError>;
