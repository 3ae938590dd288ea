//! Provider module
//!
//! Defines the upstream dispatch trait and its HTTP implementation

pub mod openai;

use crate::models::openai::{OutboundRequest, UpstreamCompletion};
use crate::services::router::ProviderTarget;
use crate::utils::error::GatewayResult;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;

/// A boxed stream of streaming responses
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// What a provider sent back
pub enum UpstreamReply {
    /// Complete JSON completion (non-streaming mode)
    Buffered(UpstreamCompletion),
    /// Raw response body bytes (streaming mode)
    Streaming(BoxStream<'static, Bytes>),
}

impl std::fmt::Debug for UpstreamReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamReply::Buffered(completion) => f.debug_tuple("Buffered").field(completion).finish(),
            UpstreamReply::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// Upstream dispatcher
///
/// One attempt per call; the mode follows `request.stream`.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Get the dispatcher name
    fn name(&self) -> &str;

    /// Send a chat completion request to the provider
    async fn dispatch(
        &self,
        provider: ProviderTarget<'_>,
        request: &OutboundRequest,
        timeout: Duration,
    ) -> GatewayResult<UpstreamReply>;
}

pub use openai::OpenAICompatibleUpstream;
