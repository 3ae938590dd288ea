//! Response normalizer
//!
//! Reshapes a buffered upstream completion into the published envelope

use crate::models::openai::{ResponseEnvelope, UpstreamCompletion, Usage};
use chrono::Utc;
use uuid::Uuid;

/// Response normalizer
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Build the client envelope
    ///
    /// `model` echoes the alias the client asked for, never the provider's model id.
    pub fn normalize(&self, requested_alias: &str, completion: UpstreamCompletion) -> ResponseEnvelope {
        let usage = completion.usage.map(Usage::with_total).unwrap_or_default();

        ResponseEnvelope {
            id: format!("chatcmpl-{}", Uuid::new_v4().simple()),
            object: "chat.completion".to_string(),
            created: Utc::now().timestamp(),
            model: requested_alias.to_string(),
            choices: completion.choices,
            usage,
        }
    }
}
