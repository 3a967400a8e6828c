mod agent;
mod config;
mod errors;
mod models;
mod routes;
mod service;

use std::sync::Arc;

use tracing::info;

use crate::agent::OpenAiAgentService;
use crate::config::Config;
use crate::service::relay_service::RelayService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_relay=debug,tower_http=debug".into()),
        )
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let config = Config::from_env()?;
    info!(model = %config.model, base_url = %config.base_url, "configuration loaded");

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let agent = OpenAiAgentService::new(&config)?;
    let relay = RelayService::new(Arc::new(agent));
    let app = routes::router(relay);

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, app).await?;
    Ok(())
}
