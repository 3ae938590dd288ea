//! modelgate library
//!
//! An OpenAI-compatible chat completion gateway that routes requests to
//! multiple inference providers by model alias

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;

// Re-export common types
pub use config::{GatewayConfig, Settings};
pub use handlers::{create_router, create_router_with_state, AppState};
pub use models::openai;
pub use providers::{OpenAICompatibleUpstream, Upstream, UpstreamReply};
pub use services::{BudgetGuard, ModelRouter, StreamRelay};
pub use utils::error::{GatewayError, GatewayResult};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get version information
pub fn version_info() -> String {
    format!("{} v{} - {}", NAME, VERSION, DESCRIPTION)
}
