//! Model listing handler
//!
//! Publishes the alias table in the OpenAI list shape

use crate::config::Capability;
use crate::handlers::AppState;
use crate::services::router::effective_timeout;
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Model list response
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

/// One alias; the provider-side model id is not exposed
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub owned_by: String,
    pub timeout_ms: u64,
    pub capabilities: Vec<Capability>,
}

/// List aliases
///
/// GET /v1/models (also /models)
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    let providers = state.router.providers();

    let data = state
        .router
        .aliases()
        .entries()
        .into_iter()
        .filter_map(|alias| {
            let endpoint = providers.get(&alias.provider)?;
            Some(ModelEntry {
                id: alias.key.clone(),
                object: "model".to_string(),
                owned_by: alias.provider.clone(),
                timeout_ms: effective_timeout(alias, endpoint).as_millis() as u64,
                capabilities: alias.capabilities.iter().copied().collect(),
            })
        })
        .collect();

    Json(ModelList {
        object: "list".to_string(),
        data,
    })
}
