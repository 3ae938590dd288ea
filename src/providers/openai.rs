//! OpenAI-compatible upstream
//!
//! Every configured provider speaks the OpenAI chat completions protocol

use super::{Upstream, UpstreamReply};
use crate::models::openai::{OutboundRequest, UpstreamCompletion};
use crate::services::router::ProviderTarget;
use crate::utils::error::{GatewayError, GatewayResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, error};

/// HTTP dispatcher for OpenAI-compatible providers
///
/// Timeouts are applied per request, so one client serves every provider.
#[derive(Debug, Clone)]
pub struct OpenAICompatibleUpstream {
    client: Client,
}

impl OpenAICompatibleUpstream {
    /// Create a new dispatcher
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("modelgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    fn build_request(&self, provider: ProviderTarget<'_>, request: &OutboundRequest) -> RequestBuilder {
        let accept = if request.stream {
            "text/event-stream"
        } else {
            "application/json"
        };

        self.client
            .post(provider.endpoint.chat_completions_url())
            .header(AUTHORIZATION, provider.credential.bearer())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, accept)
            .json(request)
    }

    /// Buffered mode: the timeout covers the whole exchange
    async fn send_buffered(&self, builder: RequestBuilder, timeout: Duration) -> GatewayResult<UpstreamReply> {
        let response = builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| GatewayError::from_transport(e, timeout))?;

        let response = ensure_success(response, timeout).await?;

        let completion: UpstreamCompletion = response
            .json()
            .await
            .map_err(|e| GatewayError::from_transport(e, timeout))?;

        debug!("Upstream completion received with {} choices", completion.choices.len());
        Ok(UpstreamReply::Buffered(completion))
    }

    /// Streaming mode: the timeout covers the response head, the relay watchdog covers the body
    async fn send_streaming(&self, builder: RequestBuilder, timeout: Duration) -> GatewayResult<UpstreamReply> {
        let exchange = async {
            let response = builder
                .send()
                .await
                .map_err(|e| GatewayError::from_transport(e, timeout))?;
            ensure_success(response, timeout).await
        };

        let response = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| GatewayError::UpstreamTimeout { timeout })??;

        debug!("Upstream stream opened");

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.context("Upstream stream error"));

        Ok(UpstreamReply::Streaming(Box::pin(stream)))
    }
}

#[async_trait]
impl Upstream for OpenAICompatibleUpstream {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn dispatch(
        &self,
        provider: ProviderTarget<'_>,
        request: &OutboundRequest,
        timeout: Duration,
    ) -> GatewayResult<UpstreamReply> {
        let builder = self.build_request(provider, request);

        if request.stream {
            self.send_streaming(builder, timeout).await
        } else {
            self.send_buffered(builder, timeout).await
        }
    }
}

/// Map a status >= 400 to an upstream error carrying that status
async fn ensure_success(response: Response, timeout: Duration) -> GatewayResult<Response> {
    let status = response.status();
    if status.as_u16() < 400 {
        return Ok(response);
    }

    let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let payload = match response.text().await {
        Ok(text) => text,
        Err(e) if e.is_timeout() => return Err(GatewayError::UpstreamTimeout { timeout }),
        Err(_) => String::new(),
    };

    error!("Upstream API error {}: {}", status, payload);
    Err(GatewayError::from_upstream_status(status, &payload))
}
