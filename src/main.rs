use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use cg_management::config::AppConfig;
use cg_management::feed::BroadcastEventSource;
use cg_management::services::memory;
use cg_management::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "cg-management", version, about = "Management API gateway")]
struct Args {
    /// Port to listen on (overrides CG_MANAGEMENT_PORT / PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides CG_MANAGEMENT_BIND)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up JWT_SECRET, APP_ENV, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    tracing::info!("Starting CG Management API in {:?} mode", config.environment);
    if config.is_production() && !config.feed.require_auth {
        tracing::warn!("Live event feed is public (FEED_REQUIRE_AUTH is not set)");
    }

    let events = Arc::new(BroadcastEventSource::new(
        config.feed.channel_capacity,
        config.feed.history_limit,
    ));
    let controllers = memory::controllers(&config, events.clone());
    let bind_addr = format!("{}:{}", config.server.bind, config.server.port);

    let state = AppState::new(config, controllers, events).context("failed to initialise application state")?;
    let app = cg_management::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("CG Management API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
