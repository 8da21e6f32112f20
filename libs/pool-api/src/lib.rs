//! # falcon-pool-api
//!
//! Device model and HTTP client for the Falcon resource-pool registry.
//!
//! The registry is the authoritative store of `device -> host-port`
//! bindings. Every other component reads or mutates fabric state only
//! through the operations defined here:
//!
//! - `list` - snapshot of all devices with their current binding
//! - `attach` - bind an unattached device to a host port
//! - `detach` - clear a device's binding (idempotent)

mod client;
mod error;
mod types;

pub use client::PoolClient;
pub use error::PoolError;
pub use types::{AttachRequest, DetachRequest, Device};

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, PoolError>;
