//! Falcon device plugin.
//!
//! Advertises the composable GPUs currently attached to this node's host
//! port as allocatable resources. The kubelet-facing gRPC surface reads
//! the inventory stream; this process owns the registry poller and the
//! socket watch that triggers re-registration via supervisor restart.

use anyhow::{bail, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use falcon_device_plugin::{
    config::{self, Config},
    inventory::Inventory,
    poller::Poller,
    watcher,
};
use falcon_pool_api::PoolClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting falcon device plugin");

    let config = Config::from_env()?;
    info!(
        host_port = %config.host_port,
        api_endpoint = %config.api_endpoint,
        "Configuration loaded"
    );

    let inventory = Inventory::new();
    let client = PoolClient::list_only(config.api_endpoint.clone());
    let poller = Poller::new(
        client,
        config.host_port.clone(),
        config.poll_interval,
        inventory.clone(),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let poller_handle = tokio::spawn(async move { poller.run(shutdown_rx).await });

    let plugin_dir = config.plugin_dir.clone();
    tokio::select! {
        res = watcher::wait_for_socket_recreation(&plugin_dir, config::KUBELET_SOCKET) => {
            res?;
            // Exit non-zero so the supervisor restarts and re-registers us.
            bail!("kubelet socket recreated, restarting for re-registration");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received ctrl-c, shutting down");
        }
    }

    let _ = shutdown_tx.send(true);
    poller_handle.await?;

    Ok(())
}
