use anyhow::{Context, Result};
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the seed manifest, one `DevID,HostPort` per line.
    pub manifest_path: String,
    pub listen_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let manifest_path =
            std::env::var("FALCON_POOL_MANIFEST").context("FALCON_POOL_MANIFEST is not set")?;

        let listen_addr = std::env::var("FALCON_POOL_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
            .parse()
            .context("invalid FALCON_POOL_LISTEN_ADDR")?;

        Ok(Self {
            manifest_path,
            listen_addr,
        })
    }
}
