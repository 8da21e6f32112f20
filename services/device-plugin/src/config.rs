//! Device-plugin configuration.
//!
//! The deployment ships one YAML file to every node; each node selects its
//! own host port by matching its `NODE_IP` against the `local_ips` list.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Default location of the deployment config.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/kubernetes/device-plugin-config.yaml";

/// Directory where the kubelet expects plugin sockets.
pub const DEVICE_PLUGIN_DIR: &str = "/var/lib/kubelet/device-plugins/";

/// This plugin's socket name within [`DEVICE_PLUGIN_DIR`].
pub const PLUGIN_SOCKET: &str = "falcon.sock";

/// The kubelet's own registration socket.
pub const KUBELET_SOCKET: &str = "kubelet.sock";

/// On-disk shape of the deployment config. The two lists are
/// comma-separated and parallel, indexed by node.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    local_ips: String,
    #[serde(default)]
    host_ports: String,
    #[serde(default)]
    api_endpoint: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// The fabric attach point co-located with this node.
    pub host_port: String,
    /// Registry list endpoint.
    pub api_endpoint: String,
    pub poll_interval: Duration,
    pub plugin_dir: PathBuf,
}

impl Config {
    /// Load from the path in `FALCON_PLUGIN_CONFIG` (or the default),
    /// selecting this node's entry by the `NODE_IP` env var.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("FALCON_PLUGIN_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let node_ip = std::env::var("NODE_IP").unwrap_or_default();
        Self::load(&path, &node_ip)
    }

    /// Load from an explicit path for an explicit node ip.
    pub fn load(path: &str, node_ip: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        let raw: RawConfig =
            serde_yaml::from_str(&content).with_context(|| format!("invalid YAML in {path}"))?;

        let ips: Vec<&str> = raw.local_ips.split(',').collect();
        let ports: Vec<&str> = raw.host_ports.split(',').collect();

        let host_port = ips
            .iter()
            .position(|ip| *ip == node_ip)
            .and_then(|i| ports.get(i))
            .map(|port| port.to_string())
            .unwrap_or_default();

        if host_port.is_empty() || raw.api_endpoint.is_empty() {
            bail!("host port or endpoint is missing for node ip '{node_ip}'");
        }

        Ok(Self {
            host_port,
            api_endpoint: raw.api_endpoint,
            poll_interval: Duration::from_secs(1),
            plugin_dir: PathBuf::from(DEVICE_PLUGIN_DIR),
        })
    }
}
