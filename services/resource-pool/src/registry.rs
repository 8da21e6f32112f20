//! The device lookup table and its mutation rules.

use std::collections::HashMap;

use falcon_pool_api::Device;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("device not found")]
    NotFound,

    #[error("device is already attached, detach it first")]
    AlreadyAttached,

    #[error("hostport is not given")]
    MissingHostPort,
}

/// Ordered device table with a `devid` index.
///
/// Seed order is preserved so listings are deterministic. For a duplicated
/// `devid` the first seeded entry wins all lookups.
pub struct Registry {
    devices: Vec<Device>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new(devices: Vec<Device>) -> Self {
        let mut index = HashMap::with_capacity(devices.len());
        for (i, device) in devices.iter().enumerate() {
            index.entry(device.devid.clone()).or_insert(i);
        }
        Self { devices, index }
    }

    /// Snapshot of all devices in seed order.
    pub fn list(&self) -> Vec<Device> {
        self.devices.clone()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Bind a device to a host port. The device must currently be
    /// unattached.
    pub fn attach(&mut self, devid: &str, hostport: &str) -> Result<(), RegistryError> {
        let i = *self.index.get(devid).ok_or(RegistryError::NotFound)?;
        if self.devices[i].is_attached() {
            return Err(RegistryError::AlreadyAttached);
        }
        if hostport.is_empty() {
            return Err(RegistryError::MissingHostPort);
        }
        self.devices[i].hostport = hostport.to_string();
        Ok(())
    }

    /// Clear a device's binding. Idempotent: detaching an unattached
    /// device succeeds.
    pub fn detach(&mut self, devid: &str) -> Result<(), RegistryError> {
        let i = *self.index.get(devid).ok_or(RegistryError::NotFound)?;
        self.devices[i].hostport.clear();
        Ok(())
    }
}
