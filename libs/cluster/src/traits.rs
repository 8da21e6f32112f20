//! Adapter traits for the orchestrator.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::types::{Pod, PodEvent};
use crate::Result;

/// Pod and node operations against the orchestrator API.
///
/// Reads go to the API server, not a scheduler snapshot; callers that need
/// snapshot semantics carry their own snapshot types.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List all pods cluster-wide.
    async fn list_pods(&self) -> Result<Vec<Pod>>;

    /// Fetch a single pod.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;

    /// Merge the given annotations into a pod's metadata.
    async fn patch_pod_annotations(
        &self,
        namespace: &str,
        name: &str,
        annotations: BTreeMap<String, String>,
    ) -> Result<()>;

    /// Emit a normal event on a pod object.
    async fn emit_pod_event(
        &self,
        namespace: &str,
        name: &str,
        reason: &str,
        message: &str,
    ) -> Result<()>;

    /// Read an environment variable from a pod's running container by
    /// exec-ing `sh -c 'echo $VAR'`. Returns the raw value with the
    /// trailing newline stripped; empty when the variable is unset.
    async fn read_container_env(&self, namespace: &str, name: &str, var: &str) -> Result<String>;

    /// Current allocatable composable-GPU count of a node, from a fresh
    /// API read.
    async fn node_allocatable_gpus(&self, node_name: &str) -> Result<i64>;
}

/// Stream of pod-scoped orchestrator events.
///
/// `Ok(None)` means the stream ended; consumers treat that, like `Err`,
/// as fatal and let their supervisor restart the process.
#[async_trait]
pub trait EventStream: Send {
    async fn next_event(&mut self) -> Result<Option<PodEvent>>;
}
