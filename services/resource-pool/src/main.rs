//! Falcon resource-pool registry.
//!
//! Serves the authoritative `device -> host-port` table over HTTP. State
//! lives in memory and is reconstructed from the seed manifest on restart;
//! the fabric itself is the durable record.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use falcon_resource_pool::{api, config::Config, manifest, registry::Registry, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting falcon resource-pool");

    let config = Config::from_env()?;
    info!(
        manifest = %config.manifest_path,
        listen_addr = %config.listen_addr,
        "Configuration loaded"
    );

    let devices = manifest::load(&config.manifest_path)?;
    info!(device_count = devices.len(), "Seed manifest loaded");

    let state = AppState::new(Registry::new(devices));
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    axum::serve(listener, app).await?;

    Ok(())
}
