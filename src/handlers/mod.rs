//! HTTP handlers module
//!
//! Contains all HTTP endpoint handling logic

pub mod health;
pub mod models;
pub mod proxy;

use crate::config::{GatewayConfig, Settings};
use crate::middleware::request_logging_middleware;
use crate::providers::{OpenAICompatibleUpstream, Upstream};
use crate::services::{
    BudgetGuard, Clock, ModelRouter, RequestTransformer, ResponseNormalizer, StreamRelay, SystemClock,
};
use crate::utils::error::ErrorEnvelope;
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Application state
pub struct AppState {
    pub settings: Settings,
    pub router: ModelRouter,
    pub budget: Arc<BudgetGuard>,
    pub transformer: RequestTransformer,
    pub normalizer: ResponseNormalizer,
    pub relay: StreamRelay,
    pub upstream: Arc<dyn Upstream>,
}

impl AppState {
    /// Build state with the HTTP dispatcher and the wall clock
    pub fn new(settings: Settings, config: &GatewayConfig) -> Result<Self> {
        let upstream = Arc::new(OpenAICompatibleUpstream::new()?);
        Self::with_upstream(settings, config, upstream, Arc::new(SystemClock))
    }

    /// Build state around a given dispatcher and clock
    pub fn with_upstream(
        settings: Settings,
        config: &GatewayConfig,
        upstream: Arc<dyn Upstream>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let router = ModelRouter::from_config(config)?;
        let budget = Arc::new(BudgetGuard::from_registry(router.providers(), clock));
        let relay = StreamRelay::new(settings.stream_grace());
        info!("Upstream dispatcher: {}", upstream.name());

        Ok(Self {
            transformer: RequestTransformer::new(config.defaults.clone()),
            normalizer: ResponseNormalizer::new(),
            settings,
            router,
            budget,
            relay,
            upstream,
        })
    }
}

/// Create application router
pub async fn create_router(settings: Settings, config: GatewayConfig) -> Result<Router> {
    let state = AppState::new(settings, &config)?;
    Ok(create_router_with_state(Arc::new(state)))
}

/// Create application router around prepared state
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    health::mark_started();

    let max_request_size = state.settings.request.max_request_size;
    let cors_enabled = state.settings.security.cors_enabled;

    let mut router = Router::new()
        .route("/v1/chat/completions", post(proxy::chat_completions))
        .route("/chat/completions", post(proxy::chat_completions))
        .route("/v1/models", get(models::list_models))
        .route("/models", get(models::list_models))
        .route("/health", get(health::health_check))
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_request_size))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    info!("HTTP routes registered (CORS {})", if cors_enabled { "enabled" } else { "disabled" });
    router
}

/// Unknown route, rendered in the error envelope shape
async fn not_found(uri: Uri) -> Response {
    let message = format!(
        "Route {} not found. Available endpoints: POST /v1/chat/completions, POST /chat/completions, GET /v1/models, GET /models, GET /health",
        uri.path()
    );

    (
        StatusCode::NOT_FOUND,
        Json(ErrorEnvelope::new(message, "not_found_error", StatusCode::NOT_FOUND)),
    )
        .into_response()
}
