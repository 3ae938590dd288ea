//! Integration test module
//!
//! Exercises the assembled router without a network upstream

#[cfg(test)]
mod integration_tests {
    use crate::config::{GatewayConfig, Settings};
    use crate::handlers::create_router;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn create_test_config() -> GatewayConfig {
        GatewayConfig::from_json(
            r#"{
                "providers": {
                    "groq": { "baseUrl": "http://127.0.0.1:9", "apiKey": "gsk-test", "timeoutMs": 60000 }
                },
                "aliases": {
                    "default": { "model": "llama-3.1-8b-instant", "provider": "groq", "timeoutMs": 30000 },
                    "deepseek": { "model": "deepseek-ai/deepseek-r1", "provider": "groq", "capabilities": ["reasoning"] }
                }
            }"#,
        )
        .expect("Failed to parse test config")
    }

    async fn create_test_app() -> Router {
        create_router(Settings::default(), create_test_config())
            .await
            .expect("Failed to create router")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_test_app().await;

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["details"]["aliases"], 2);
    }

    #[tokio::test]
    async fn test_unknown_route_uses_error_envelope() {
        let app = create_test_app().await;

        let request = Request::builder().uri("/v1/messages").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["type"], "not_found_error");
        assert_eq!(json["error"]["code"], 404);
    }

    #[tokio::test]
    async fn test_models_listing_hides_targets() {
        let app = create_test_app().await;

        let request = Request::builder().uri("/v1/models").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["object"], "list");

        let data = json["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["id"], "deepseek");
        assert_eq!(data[0]["owned_by"], "groq");
        assert_eq!(data[0]["timeout_ms"], 60000);
        assert_eq!(data[0]["capabilities"][0], "reasoning");
        assert_eq!(data[1]["id"], "default");
        assert_eq!(data[1]["timeout_ms"], 30000);
        assert!(!json.to_string().contains("deepseek-ai/deepseek-r1"));
    }

    #[tokio::test]
    async fn test_messages_not_array_is_rejected() {
        let app = create_test_app().await;

        let request = Request::builder()
            .method("POST")
            .uri("/chat/completions")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"model":"default","messages":"hello"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["type"], "invalid_request_error");
        assert_eq!(json["error"]["code"], 400);
    }
}
