//! Falcon reconfiguration daemon.
//!
//! Watches pod-scoped orchestrator events for the scheduler's `Reconfig`
//! reason and rewrites registry bindings so gated pods find their devices
//! waiting.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use falcon_cluster::kube::KubeCluster;
use falcon_pool_api::PoolClient;
use falcon_reconfig_mgr::{
    config::Config,
    daemon,
    reconfigure::{QuiesceConfig, Reconfigurer},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting falcon reconfig-mgr");

    let config = Config::from_env()?;
    info!(
        node_count = config.node_ports.len(),
        get_rec_endpoint = %config.get_rec_endpoint,
        reconfig_endpoint = %config.reconfig_endpoint,
        "Configuration loaded"
    );

    let cluster = KubeCluster::connect().await?;
    let events = cluster.pod_events();

    let pool = PoolClient::new(
        config.get_rec_endpoint.clone(),
        config.reconfig_endpoint.clone(),
    );
    let quiesce = QuiesceConfig {
        timeout: config.quiesce_timeout,
        poll_interval: config.quiesce_poll_interval,
    };
    let reconfigurer = Reconfigurer::new(cluster, pool, config.node_ports, quiesce);

    // Runs until the event stream is lost; the supervisor restarts us.
    daemon::run(reconfigurer, events).await?;

    Ok(())
}
