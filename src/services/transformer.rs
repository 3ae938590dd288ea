//! Request transformer
//!
//! Builds the provider-bound body from the client request and the resolved alias

use crate::config::RequestDefaults;
use crate::models::openai::{ChatRequest, OutboundRequest};
use crate::services::aliases::ModelAlias;

/// Request transformer
#[derive(Debug, Clone, Default)]
pub struct RequestTransformer {
    defaults: RequestDefaults,
}

impl RequestTransformer {
    pub fn new(defaults: RequestDefaults) -> Self {
        Self { defaults }
    }

    /// Build the outbound body
    ///
    /// Messages are copied untouched; unset parameters take the deployment defaults.
    pub fn transform(&self, request: &ChatRequest, alias: &ModelAlias) -> OutboundRequest {
        OutboundRequest {
            model: alias.target.clone(),
            messages: request.messages.clone(),
            temperature: request.temperature.unwrap_or(self.defaults.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.defaults.max_tokens),
            stream: request.stream.unwrap_or(self.defaults.stream),
            frequency_penalty: request
                .frequency_penalty
                .unwrap_or(self.defaults.frequency_penalty),
            presence_penalty: request
                .presence_penalty
                .unwrap_or(self.defaults.presence_penalty),
            top_p: request.top_p,
            stop: request.stop.clone(),
            stream_options: None,
        }
    }
}
