//! Health check handlers
//!
//! Provides application health status check endpoints

use crate::handlers::AppState;
use axum::{extract::State, response::Json};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service name
    pub service: String,
    /// Version information
    pub version: String,
    /// Timestamp
    pub timestamp: String,
    /// Details
    pub details: HealthDetails,
}

/// Check result
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthDetails {
    /// Credential status per provider
    pub providers: Vec<ProviderStatus>,
    /// Number of configured aliases
    pub aliases: usize,
    /// Upstream dispatcher in use
    pub dispatcher: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
}

/// Provider status
#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub provider: String,
    /// "configured" or "missing"
    pub credential: String,
    /// Whether a daily cap applies
    pub metered: bool,
    /// Today's estimated spend, for metered providers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_spend: Option<f64>,
}

/// Basic health check
///
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Executing health check");

    let providers = state
        .router
        .providers()
        .endpoints()
        .into_iter()
        .map(|endpoint| {
            state.budget.check_and_reset(&endpoint.tag);
            ProviderStatus {
                provider: endpoint.tag.clone(),
                credential: if endpoint.is_configured() { "configured" } else { "missing" }.to_string(),
                metered: endpoint.is_metered(),
                daily_spend: state.budget.snapshot(&endpoint.tag).map(|budget| budget.spend),
            }
        })
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        details: HealthDetails {
            providers,
            aliases: state.router.aliases().len(),
            dispatcher: state.upstream.name().to_string(),
            uptime_seconds: get_uptime_seconds(),
        },
    })
}

/// Pin the uptime origin to process start
pub fn mark_started() {
    Lazy::force(&START_TIME);
}

/// Get service uptime in seconds
fn get_uptime_seconds() -> u64 {
    START_TIME.elapsed().as_secs()
}
