//! modelgate server
//!
//! OpenAI-compatible gateway routing chat completions to multiple providers
//! by model alias, configured from a JSON file

use anyhow::{Context, Result};
use modelgate::{create_router, version_info, GatewayConfig, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load settings first so logging honours LOG_LEVEL / LOG_FORMAT
    let settings = Settings::new().context("Failed to load server settings")?;

    init_logging(&settings)?;
    info!("{}", version_info());

    let config = GatewayConfig::load_default().context("Failed to load gateway configuration")?;
    info!(
        "📁 Gateway configuration loaded: {} providers, {} aliases",
        config.providers.len(),
        config.aliases.len()
    );

    let port = settings.port_override.unwrap_or(config.server.port);
    let addr = format!("{}:{}", config.server.host, port);

    let app = create_router(settings, config).await?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("🚀 modelgate server started!");
    info!("📝 Health check: http://{}/health", addr);
    info!("🔄 Proxy endpoint: http://{}/v1/chat/completions", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start server: {}", e))?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging system
fn init_logging(settings: &Settings) -> Result<()> {
    let log_level = settings.logging.level.clone();

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if settings.logging.format == "json" {
        // JSON format logs (production environment)
        Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(log_level)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .finish(),
        )
    } else {
        // Human readable format (development environment)
        Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(log_level)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish(),
        )
    };

    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    info!("Logging system initialized");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
