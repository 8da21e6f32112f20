//! HTTP client for the resource-pool registry.

use std::time::Duration;

use tracing::debug;

use crate::types::{AttachRequest, DetachRequest, Device};
use crate::{PoolError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the registry's list and mutation endpoints.
///
/// The two endpoints are configured independently because deployments
/// route them separately; a component that only ever lists (the device
/// plugin) is built with [`PoolClient::list_only`].
pub struct PoolClient {
    http: reqwest::Client,
    list_endpoint: String,
    mutate_endpoint: Option<String>,
}

impl PoolClient {
    /// Create a client with both list and mutation endpoints.
    pub fn new(list_endpoint: impl Into<String>, mutate_endpoint: impl Into<String>) -> Self {
        Self {
            http: Self::build_http(),
            list_endpoint: list_endpoint.into(),
            mutate_endpoint: Some(mutate_endpoint.into()),
        }
    }

    /// Create a read-only client; attach/detach will fail.
    pub fn list_only(list_endpoint: impl Into<String>) -> Self {
        Self {
            http: Self::build_http(),
            list_endpoint: list_endpoint.into(),
            mutate_endpoint: None,
        }
    }

    fn build_http() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client")
    }

    /// Fetch the full device list.
    pub async fn list(&self) -> Result<Vec<Device>> {
        debug!(url = %self.list_endpoint, "Listing pool devices");

        let response = self.http.get(&self.list_endpoint).send().await?;
        let response = Self::check_status(response).await?;
        let devices: Vec<Device> = response.json().await?;

        debug!(device_count = devices.len(), "Fetched pool devices");
        Ok(devices)
    }

    /// Bind `devid` to `hostport`. The registry rejects the call when the
    /// device is already attached; callers detach first.
    pub async fn attach(&self, devid: &str, hostport: &str) -> Result<()> {
        let endpoint = self.mutate_endpoint()?;
        debug!(devid, hostport, "Attaching device");

        let body = AttachRequest {
            devid: devid.to_string(),
            hostport: hostport.to_string(),
            uuid: None,
        };
        let response = self.http.post(endpoint).json(&body).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Clear the binding of `devid`. Detaching an already-detached device
    /// succeeds.
    pub async fn detach(&self, devid: &str) -> Result<()> {
        let endpoint = self.mutate_endpoint()?;
        debug!(devid, "Detaching device");

        let body = DetachRequest {
            devid: devid.to_string(),
        };
        let response = self.http.delete(endpoint).json(&body).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    fn mutate_endpoint(&self) -> Result<&str> {
        self.mutate_endpoint
            .as_deref()
            .ok_or(PoolError::MutationUnsupported)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(PoolError::Status {
            status: status.as_u16(),
            message,
        })
    }
}
