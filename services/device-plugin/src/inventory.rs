//! The advertised per-node device inventory.

use tokio::sync::watch;

/// One device as advertised to the orchestrator.
///
/// `devid` is the allocatable id the orchestrator hands back on
/// allocation; `uuid` is resolved at that point for the runtime hook.
/// Devices are always advertised healthy - health diagnostics are out of
/// scope for the fabric adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedDevice {
    pub devid: String,
    pub uuid: String,
    pub healthy: bool,
}

/// Latest advertisement plus change notification.
///
/// The poller is the single writer; the kubelet-facing stream handler
/// reads the latest list and wakes on change, mirroring a full
/// `ListAndWatch` update. Missed intermediate states are fine - only the
/// newest list matters.
#[derive(Clone)]
pub struct Inventory {
    tx: watch::Sender<Vec<AdvertisedDevice>>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self { tx }
    }

    /// The list as last advertised.
    pub fn current(&self) -> Vec<AdvertisedDevice> {
        self.tx.borrow().clone()
    }

    /// Subscribe for change notifications.
    pub fn subscribe(&self) -> watch::Receiver<Vec<AdvertisedDevice>> {
        self.tx.subscribe()
    }

    /// Replace the advertisement if it changed. Returns whether an update
    /// was published.
    pub fn publish(&self, devices: Vec<AdvertisedDevice>) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == devices {
                false
            } else {
                *current = devices;
                true
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(devid: &str, uuid: &str) -> AdvertisedDevice {
        AdvertisedDevice {
            devid: devid.to_string(),
            uuid: uuid.to_string(),
            healthy: true,
        }
    }

    #[test]
    fn publish_suppresses_unchanged_lists() {
        let inventory = Inventory::new();

        assert!(inventory.publish(vec![dev("gpu0", "u0")]));
        assert!(!inventory.publish(vec![dev("gpu0", "u0")]));
        assert!(inventory.publish(vec![dev("gpu0", "u0"), dev("gpu1", "u1")]));
    }

    #[tokio::test]
    async fn subscribers_wake_on_change() {
        let inventory = Inventory::new();
        let mut rx = inventory.subscribe();

        inventory.publish(vec![dev("gpu0", "u0")]);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
