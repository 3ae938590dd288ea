//! Data models module
//!
//! Defines request and response data structures of the OpenAI-compatible chat API

pub mod openai;

pub use openai::{
    ChatMessage, ChatRequest, Choice, OutboundRequest, ResponseEnvelope, UpstreamCompletion, Usage,
};
