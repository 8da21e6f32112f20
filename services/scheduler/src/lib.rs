//! # falcon-scheduler
//!
//! Placement plugin for composable GPUs, written against the host
//! scheduler framework's extension points:
//!
//! - **PreFilter** - admit or reject on cluster-wide supply, and mark the
//!   pod as a composable-GPU user.
//! - **Score / NormalizeScore** - prefer nodes whose free supply sits
//!   closest to the request; nodes in deficit stay feasible (the fabric
//!   can be reconfigured) but are dominated.
//! - **Permit** - gate container admission until the chosen node's local
//!   supply matches the request, signalling the reconfiguration daemon
//!   through pod annotations and a `Reconfig` event.
//!
//! The framework itself (scheduling cycles, snapshots, the plugin
//! registry) is the host's; [`framework`] carries the narrow slice of its
//! vocabulary the plugin needs.

pub mod framework;
mod plugin;

pub use plugin::{FalconResources, PermitConfig};
