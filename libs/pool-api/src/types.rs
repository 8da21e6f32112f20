//! Wire types shared between the registry and its clients.

use serde::{Deserialize, Serialize};

/// A composable accelerator as the registry sees it.
///
/// `devid` is the stable fabric-assigned identity. `uuid` is the opaque
/// handle exposed to containers; it is minted once at registry boot and
/// never changes for the process lifetime. `hostport` is the only mutable
/// field; empty means the device is not attached anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub devid: String,
    pub uuid: String,
    pub hostport: String,
}

impl Device {
    /// Whether the device is currently bound to a host port.
    pub fn is_attached(&self) -> bool {
        !self.hostport.is_empty()
    }
}

/// Body of `POST /allocation`.
///
/// `uuid` is accepted for symmetry with the list shape but ignored by the
/// registry; the binding is keyed on `devid` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachRequest {
    pub devid: String,
    pub hostport: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

/// Body of `DELETE /allocation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetachRequest {
    pub devid: String,
}
