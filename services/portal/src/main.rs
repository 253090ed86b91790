use std::sync::Arc;

use anyhow::{Context, Result};
use catalog::CatalogStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use portal::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = AppConfig::from_env()?;

    let store = CatalogStore::open(&cfg.downloads_dir)
        .with_context(|| format!("Failed to open catalog at {}", cfg.downloads_dir.display()))?;
    info!(dir = %cfg.downloads_dir.display(), "catalog: ok");

    let state = Arc::new(AppState::new(store, cfg.clone()));
    let app = portal::app(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.bind_addr))?;
    info!(addr = %cfg.bind_addr, "portal listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
