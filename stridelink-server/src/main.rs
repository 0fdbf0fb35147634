//! Stridelink Server
//!
//! HTTP service that links identity-provider accounts to the activity
//! provider and proxies authenticated activity calls.
//!
//! # Running
//!
//! ```bash
//! cargo run -p stridelink-server
//! # or after install:
//! stridelinkd
//! ```

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use stridelink_server::{api, config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;
    init_logging(&config.log_level);

    info!("Starting Stridelink server...");
    info!("Loaded configuration from {:?}", config.config_path);

    run_server(config).await
}

/// RUST_LOG wins over the configured level when set.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn run_server(config: config::ServerConfig) -> Result<()> {
    let state = api::ApiState::new(&config)?;
    let router = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install shutdown handler: {}", e);
        return;
    }
    info!("Shutdown signal received, stopping server...");
}
