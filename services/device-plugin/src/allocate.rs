//! Allocation bindings for container creation.
//!
//! When the orchestrator allocates specific DevIDs for a container, the
//! plugin answers with environment bindings: the workload-visible logical
//! IDs and the hook-visible UUIDs.

use std::collections::BTreeMap;

use falcon_cluster::contract::container_env;
use thiserror::Error;

use crate::inventory::AdvertisedDevice;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// The orchestrator asked for a device this node no longer advertises.
    #[error("unknown device '{0}' in allocation request")]
    UnknownDevice(String),
}

/// Environment injected into an allocated container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvBindings {
    pub disag_devices: String,
    pub nvidia_visible_devices: String,
}

impl EnvBindings {
    pub fn into_env(self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                container_env::DISAG_DEVICES.to_string(),
                self.disag_devices,
            ),
            (
                container_env::NVIDIA_VISIBLE_DEVICES.to_string(),
                self.nvidia_visible_devices,
            ),
        ])
    }
}

/// Resolve an allocation request against the current advertisement.
pub fn allocate(
    snapshot: &[AdvertisedDevice],
    dev_ids: &[String],
) -> Result<EnvBindings, AllocationError> {
    let mut uuids = Vec::with_capacity(dev_ids.len());
    for devid in dev_ids {
        let device = snapshot
            .iter()
            .find(|d| d.devid == *devid)
            .ok_or_else(|| AllocationError::UnknownDevice(devid.clone()))?;
        uuids.push(device.uuid.as_str());
    }

    Ok(EnvBindings {
        disag_devices: dev_ids.join(","),
        nvidia_visible_devices: uuids.join(","),
    })
}
