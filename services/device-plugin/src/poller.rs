//! Registry polling loop.
//!
//! Re-lists the registry on a fixed tick and advertises the devices bound
//! to this node's host port. Polling keeps the registry stateless with
//! respect to clients; a failed poll never shrinks the advertisement.

use std::time::Duration;

use falcon_pool_api::PoolClient;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::inventory::{AdvertisedDevice, Inventory};

pub struct Poller {
    client: PoolClient,
    host_port: String,
    interval: Duration,
    inventory: Inventory,
}

impl Poller {
    pub fn new(
        client: PoolClient,
        host_port: String,
        interval: Duration,
        inventory: Inventory,
    ) -> Self {
        Self {
            client,
            host_port,
            interval,
            inventory,
        }
    }

    /// Run until shutdown is signaled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            host_port = %self.host_port,
            interval_secs = self.interval.as_secs(),
            "Starting inventory poller"
        );

        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Inventory poller shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One reconciliation pass. Registry errors keep the previous
    /// advertisement.
    pub async fn poll_once(&self) {
        let devices = match self.client.list().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "Registry poll failed, keeping last advertisement");
                return;
            }
        };

        let mut local: Vec<AdvertisedDevice> = devices
            .into_iter()
            .filter(|d| d.hostport == self.host_port)
            .map(|d| AdvertisedDevice {
                devid: d.devid,
                uuid: d.uuid,
                healthy: true,
            })
            .collect();
        local.sort_by(|a, b| a.uuid.cmp(&b.uuid));

        let count = local.len();
        if self.inventory.publish(local) {
            info!(device_count = count, "Advertised device list changed");
        } else {
            debug!(device_count = count, "Advertisement unchanged");
        }
    }
}
