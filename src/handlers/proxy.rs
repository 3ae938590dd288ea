//! Chat completion proxy handler
//!
//! Resolves the alias, checks the budget, rewrites the body and dispatches it to
//! the provider, then relays the stream or normalizes the buffered reply.

use crate::handlers::AppState;
use crate::models::openai::{ChatRequest, StreamOptions};
use crate::providers::UpstreamReply;
use crate::utils::error::{GatewayError, GatewayResult};
use crate::utils::logging::create_request_log_summary;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Handle chat completion requests
///
/// POST /v1/chat/completions (also /chat/completions)
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> GatewayResult<Response> {
    let started = Instant::now();

    let body = body.map_err(|rejection| GatewayError::InvalidRequest(rejection.body_text()))?;
    let request = ChatRequest::from_slice(&body)?;

    let route = state.router.route(request.model.as_deref())?;
    let provider_tag = route.provider.endpoint.tag.clone();

    state.budget.gate(&provider_tag)?;

    let mut outbound = state.transformer.transform(&request, route.alias);
    if outbound.stream && route.provider.endpoint.is_metered() {
        outbound.stream_options = Some(StreamOptions { include_usage: true });
    }
    let requested_alias = request
        .model
        .clone()
        .unwrap_or_else(|| route.alias.key.clone());

    info!(
        "[{}] {} → {} (timeout: {}ms)",
        provider_tag.to_uppercase(),
        requested_alias,
        outbound.model,
        route.timeout.as_millis()
    );

    if let Ok(summary) = serde_json::to_string_pretty(&create_request_log_summary(&outbound)) {
        debug!("Outbound request:\n{}", summary);
    }

    let reply = state
        .upstream
        .dispatch(route.provider, &outbound, route.timeout)
        .await?;

    match reply {
        UpstreamReply::Buffered(completion) => {
            let reported_usage = completion.usage;
            let envelope = state.normalizer.normalize(&requested_alias, completion);

            if let Some(usage) = reported_usage {
                state
                    .budget
                    .record(&provider_tag, usage.prompt_tokens, usage.completion_tokens);
            }

            debug!("Request processing completed");
            Ok(Json(envelope).into_response())
        }
        UpstreamReply::Streaming(stream) => {
            let deadline = state.relay.deadline(started, route.timeout);
            let budget = state.budget.clone();

            let handle = state.relay.spawn(stream, deadline, move |outcome| {
                info!("Stream for '{}' finished: {:?}", provider_tag, outcome);
                if let Some(usage) = outcome.usage() {
                    budget.record(&provider_tag, usage.prompt_tokens, usage.completion_tokens);
                }
            });

            debug!("Starting streaming response transmission");
            Ok(handle.into_response())
        }
    }
}
