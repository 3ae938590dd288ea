//! Logging utilities
//!
//! Shared logging configuration and helper functions

use crate::models::openai::{ChatMessage, OutboundRequest};
use serde_json::{json, Value};

/// Set to true to include full message content in debug logs
pub const VERBOSE_REQUEST_LOGGING: bool = false;

/// Truncate a string with a note about original length
pub fn truncate_content(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let kept: String = s.chars().take(max_len).collect();
        format!("{}... ({} chars truncated)", kept, s.chars().count() - max_len)
    } else {
        s.to_string()
    }
}

/// Create a filtered version of a message for logging
fn filter_message(msg: &ChatMessage) -> Value {
    let max_len = if msg.role == "system" { 100 } else { 200 };
    let content = match &msg.content {
        Value::String(text) => Value::String(truncate_content(text, max_len)),
        Value::Array(parts) => json!(format!("[...{} content parts]", parts.len())),
        Value::Null => Value::Null,
        other => json!(truncate_content(&other.to_string(), max_len)),
    };

    json!({
        "role": msg.role,
        "content": content,
    })
}

/// Create a filtered summary of an outbound request for logging
/// Keeps original structure but truncates verbose content
pub fn create_request_log_summary(request: &OutboundRequest) -> Value {
    if VERBOSE_REQUEST_LOGGING {
        serde_json::to_value(request).unwrap_or(json!({"error": "serialize failed"}))
    } else {
        let filtered_messages: Vec<Value> = request.messages.iter().map(filter_message).collect();

        json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": request.stream,
            "messages": filtered_messages,
        })
    }
}
