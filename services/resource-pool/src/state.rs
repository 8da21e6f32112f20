//! Application state shared across request handlers.

use std::sync::Arc;

use falcon_pool_api::Device;
use tokio::sync::RwLock;

use crate::registry::{Registry, RegistryError};

/// Shared registry handle.
///
/// All mutations serialize on the write lock; `list` takes a consistent
/// snapshot under the read lock. Handlers receive this via Axum's state
/// extractor; nothing in the service is a module-level global.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<RwLock<Registry>>,
}

impl AppState {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
        }
    }

    pub async fn list(&self) -> Vec<Device> {
        self.registry.read().await.list()
    }

    pub async fn attach(&self, devid: &str, hostport: &str) -> Result<(), RegistryError> {
        self.registry.write().await.attach(devid, hostport)
    }

    pub async fn detach(&self, devid: &str) -> Result<(), RegistryError> {
        self.registry.write().await.detach(devid)
    }
}
