//! Seed manifest parsing.
//!
//! The manifest is UTF-8 text, one device per line in the form
//! `DevID,HostPort`. A trailing empty host port is allowed (an unattached
//! device); any other shape is fatal at boot. Each line is assigned a
//! fresh UUID that stays stable for the registry's process lifetime.

use falcon_pool_api::Device;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid format at line {line}: '{content}', expected 2 values separated by a comma")]
    BadLine { line: usize, content: String },
}

/// Read and parse the manifest at `path`.
pub fn load(path: &str) -> Result<Vec<Device>, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_string(),
        source,
    })?;
    parse(&content)
}

/// Parse manifest text, preserving line order.
pub fn parse(content: &str) -> Result<Vec<Device>, ManifestError> {
    let mut devices = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() != 2 {
            return Err(ManifestError::BadLine {
                line: index + 1,
                content: line.to_string(),
            });
        }

        devices.push(Device {
            devid: parts[0].to_string(),
            uuid: Uuid::new_v4().to_string(),
            hostport: parts[1].to_string(),
        });
    }

    Ok(devices)
}
