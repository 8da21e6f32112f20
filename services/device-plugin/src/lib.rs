//! Falcon device plugin.
//!
//! Per-node adapter between the resource-pool registry and the
//! orchestrator's allocatable-resource view. A 1 Hz poller reconciles the
//! local inventory against the registry; the kubelet-facing gRPC surface
//! consumes the [`inventory::Inventory`] stream and the
//! [`allocate`] bindings, and is otherwise external to this crate.

pub mod allocate;
pub mod config;
pub mod inventory;
pub mod poller;
pub mod watcher;
