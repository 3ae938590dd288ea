//! Data model tests

use modelgate::models::openai::{ChatMessage, ChatRequest, ResponseEnvelope, UpstreamCompletion, Usage};
use modelgate::services::aliases::ModelAlias;
use modelgate::services::{RequestTransformer, ResponseNormalizer};
use serde_json::json;
use std::collections::BTreeSet;

fn alias(key: &str, target: &str) -> ModelAlias {
    ModelAlias {
        key: key.to_string(),
        target: target.to_string(),
        provider: "nvidia".to_string(),
        timeout: None,
        capabilities: BTreeSet::new(),
    }
}

#[test]
fn test_parse_full_request() {
    let body = json!({
        "model": "kimi",
        "messages": [
            { "role": "system", "content": "Be brief" },
            { "role": "user", "content": "Hi" }
        ],
        "temperature": 0.2,
        "max_tokens": 512,
        "stream": false,
        "frequency_penalty": 0.5,
        "presence_penalty": 0.1,
        "top_p": 0.9,
        "stop": ["\n\n"]
    });

    let request = ChatRequest::from_slice(body.to_string().as_bytes()).unwrap();

    assert_eq!(request.model.as_deref(), Some("kimi"));
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.temperature, Some(0.2));
    assert_eq!(request.max_tokens, Some(512));
    assert_eq!(request.stream, Some(false));
    assert_eq!(request.top_p, Some(0.9));
    assert_eq!(request.stop, Some(json!(["\n\n"])));
}

#[test]
fn test_rejects_missing_or_invalid_messages() {
    let cases = [
        r#"{"model":"kimi"}"#,
        r#"{"messages":"Hi"}"#,
        r#"{"messages":{"role":"user"}}"#,
        r#"{"messages":[]}"#,
        r#"[1,2,3]"#,
        r#"not json"#,
    ];

    for body in cases {
        let error = ChatRequest::from_slice(body.as_bytes()).unwrap_err();
        assert_eq!(error.error_type(), "invalid_request_error", "body: {}", body);
    }
}

#[test]
fn test_message_extra_fields_forwarded() {
    let body = json!({
        "messages": [{
            "role": "assistant",
            "content": null,
            "tool_calls": [{ "id": "call_1", "type": "function", "function": { "name": "f", "arguments": "{}" } }]
        }, {
            "role": "tool",
            "tool_call_id": "call_1",
            "content": "42"
        }]
    });

    let request = ChatRequest::from_slice(body.to_string().as_bytes()).unwrap();
    let outbound = RequestTransformer::default().transform(&request, &alias("kimi", "moonshotai/kimi-k2-instruct"));
    let json = serde_json::to_value(&outbound).unwrap();

    assert_eq!(json["model"], "moonshotai/kimi-k2-instruct");
    assert_eq!(json["messages"], body["messages"]);
}

#[test]
fn test_outbound_request_shape() {
    let request = ChatRequest {
        messages: vec![ChatMessage::text("user", "Hi")],
        max_tokens: Some(0),
        ..Default::default()
    };

    let outbound = RequestTransformer::default().transform(&request, &alias("llama-8b", "meta/llama-3.1-8b-instruct"));
    let json = serde_json::to_value(&outbound).unwrap();

    assert_eq!(json["max_tokens"], 0);
    assert_eq!(json["stream"], true);
    assert_eq!(json["frequency_penalty"], 0.0);
    assert_eq!(json["presence_penalty"], 0.0);
    assert!(json.get("top_p").is_none());
}

#[test]
fn test_upstream_completion_parsing() {
    let completion: UpstreamCompletion = serde_json::from_value(json!({
        "id": "cmpl-1",
        "object": "chat.completion",
        "model": "meta/llama-3.1-70b-instruct",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": "Hello" },
            "finish_reason": "stop",
            "logprobs": null
        }],
        "usage": { "prompt_tokens": 5, "completion_tokens": 7 }
    }))
    .unwrap();

    assert_eq!(completion.choices.len(), 1);
    assert_eq!(completion.usage, Some(Usage { prompt_tokens: 5, completion_tokens: 7, total_tokens: 0 }));

    let envelope = ResponseNormalizer::new().normalize("llama-70b", completion);
    assert_eq!(envelope.usage.total_tokens, 12);
}

#[test]
fn test_response_envelope_serialization() {
    let completion: UpstreamCompletion = serde_json::from_value(json!({
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Hi" }, "finish_reason": "length" }]
    }))
    .unwrap();

    let envelope = ResponseNormalizer::new().normalize("default", completion);
    let json = serde_json::to_value(&envelope).unwrap();

    assert_eq!(json["object"], "chat.completion");
    assert_eq!(json["model"], "default");
    assert_eq!(json["choices"][0]["finish_reason"], "length");
    assert_eq!(json["usage"], json!({ "prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0 }));

    let parsed: ResponseEnvelope = serde_json::from_value(json).unwrap();
    assert_eq!(parsed.id, envelope.id);
}
