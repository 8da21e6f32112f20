//! # falcon-cluster
//!
//! Orchestrator adapter surface for the Falcon control plane.
//!
//! The container orchestrator is an external collaborator. Falcon
//! components talk to it only through the traits defined here:
//!
//! - [`ClusterApi`] - pod and node reads, annotation patches, event
//!   emission, container-env exec
//! - [`EventStream`] - the stream of pod-scoped events the reconfiguration
//!   daemon consumes
//!
//! Two implementations ship with the crate: [`mock`] (in-memory, always
//! built, used by tests and local development) and [`kube`] (Kubernetes
//! backend behind the `kube` feature).
//!
//! The annotation keys, container environment names, and the scalar
//! resource name are part of the external contract and live in
//! [`contract`].

pub mod contract;
mod error;
pub mod mock;
mod traits;
mod types;

#[cfg(feature = "kube")]
pub mod kube;

pub use error::ClusterError;
pub use traits::{ClusterApi, EventStream};
pub use types::{Pod, PodEvent, PodPhase};

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, ClusterError>;
