//! OpenAI API data models
//!
//! Defines the chat completion request accepted from clients, the body sent to
//! providers, and the response envelope published back

use crate::utils::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound chat completion request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model alias requested by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Message list
    pub messages: Vec<ChatMessage>,
    /// Temperature parameter (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether to stream response (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Frequency penalty (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Presence penalty (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Top-p parameter (optional, passed through)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Stop sequences (optional, passed through)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,
}

/// Chat message
///
/// Only `role` is interpreted; content and any extra fields are forwarded as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role (system/user/assistant/tool)
    pub role: String,
    /// Message content, string or content parts
    #[serde(default)]
    pub content: Value,
    /// Remaining fields (name, tool_calls, tool_call_id, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// Create a plain text message
    pub fn text(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
            extra: Map::new(),
        }
    }
}

impl ChatRequest {
    /// Parse and validate a raw request body
    pub fn from_slice(body: &[u8]) -> GatewayResult<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidRequest(format!("Invalid JSON body: {}", e)))?;

        let object = value.as_object().ok_or_else(|| {
            GatewayError::InvalidRequest("Request body must be a JSON object".to_string())
        })?;

        match object.get("messages") {
            Some(Value::Array(messages)) if messages.is_empty() => {
                return Err(GatewayError::InvalidRequest("Messages must not be empty".to_string()));
            }
            Some(Value::Array(_)) => {}
            _ => {
                return Err(GatewayError::InvalidRequest("Messages must be an array".to_string()));
            }
        }

        serde_json::from_value(value)
            .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request: {}", e)))
    }
}

/// Body sent to the upstream provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// Provider-side model id
    pub model: String,
    /// Message list, copied verbatim
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

/// Streaming options understood by OpenAI-compatible providers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Ask for a final chunk carrying token usage
    pub include_usage: bool,
}

/// Buffered completion returned by a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamCompletion {
    /// Choice list
    pub choices: Vec<Choice>,
    /// Usage statistics, when the provider reports them
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Completion choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Choice index
    #[serde(default)]
    pub index: u32,
    /// Message content
    #[serde(default)]
    pub message: Value,
    /// Finish reason
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt token count
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Completion token count
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total token count
    #[serde(default)]
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Fill in `total_tokens` when the provider left it out
    pub fn with_total(mut self) -> Self {
        if self.total_tokens == 0 {
            self.total_tokens = self.prompt_tokens + self.completion_tokens;
        }
        self
    }
}

/// Response envelope published to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Response ID
    pub id: String,
    /// Object type
    pub object: String,
    /// Creation timestamp (unix seconds)
    pub created: i64,
    /// Model alias requested by the client
    pub model: String,
    /// Choice list
    pub choices: Vec<Choice>,
    /// Usage statistics
    pub usage: Usage,
}

/// The part of a streamed chunk inspected for usage accounting
#[derive(Debug, Deserialize)]
pub struct StreamChunkUsage {
    #[serde(default)]
    pub usage: Option<Usage>,
    /// Groq reports stream usage under `x_groq.usage`
    #[serde(default)]
    pub x_groq: Option<GroqChunkExtension>,
}

#[derive(Debug, Deserialize)]
pub struct GroqChunkExtension {
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl StreamChunkUsage {
    /// Usage reported by this chunk, in either location
    pub fn reported(self) -> Option<Usage> {
        self.usage.or_else(|| self.x_groq.and_then(|ext| ext.usage))
    }
}
