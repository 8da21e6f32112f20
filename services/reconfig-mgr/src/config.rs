//! Daemon configuration.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Default location of the deployment config.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/kubernetes/reconfig-mgr-config.yaml";

/// On-disk shape. `node_names` and `host_ports` are comma-separated
/// parallel lists.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    node_names: String,
    #[serde(default)]
    host_ports: String,
    #[serde(default)]
    get_rec_endpoint: String,
    #[serde(default)]
    reconfig_endpoint: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Fabric attach point co-located with each node.
    pub node_ports: HashMap<String, String>,
    /// Registry list endpoint.
    pub get_rec_endpoint: String,
    /// Registry mutation endpoint.
    pub reconfig_endpoint: String,
    /// Upper bound on the quiescence wait.
    pub quiesce_timeout: Duration,
    /// Delay between quiescence passes while a pod is still pending.
    pub quiesce_poll_interval: Duration,
}

impl Config {
    /// Load from the path in `FALCON_RECONFIG_CONFIG` or the default.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("FALCON_RECONFIG_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(&path)
    }

    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        let raw: RawConfig =
            serde_yaml::from_str(&content).with_context(|| format!("invalid YAML in {path}"))?;

        let names: Vec<&str> = raw.node_names.split(',').collect();
        let ports: Vec<&str> = raw.host_ports.split(',').collect();
        if names.len() != ports.len() {
            bail!(
                "node_names and host_ports must be parallel lists ({} vs {} entries)",
                names.len(),
                ports.len()
            );
        }
        if raw.get_rec_endpoint.is_empty() || raw.reconfig_endpoint.is_empty() {
            bail!("registry endpoints are missing");
        }

        let node_ports = names
            .into_iter()
            .zip(ports)
            .map(|(n, p)| (n.to_string(), p.to_string()))
            .collect();

        Ok(Self {
            node_ports,
            get_rec_endpoint: raw.get_rec_endpoint,
            reconfig_endpoint: raw.reconfig_endpoint,
            quiesce_timeout: Duration::from_secs(300),
            quiesce_poll_interval: Duration::from_secs(1),
        })
    }
}
