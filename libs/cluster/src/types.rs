//! Orchestrator object views.
//!
//! These are deliberately narrow projections: only the fields the Falcon
//! components read. The full orchestrator objects never cross the adapter
//! boundary.

use std::collections::BTreeMap;

use crate::contract::annotations;

/// Pod lifecycle phase as reported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    /// Terminal phases never run again; their device bindings are dead.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// A pod as the Falcon components see it.
#[derive(Debug, Clone)]
pub struct Pod {
    /// Orchestrator-assigned unique id, stable across updates.
    pub uid: String,
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    /// Whether the `PodScheduled` condition is `True`.
    pub scheduled: bool,
    pub annotations: BTreeMap<String, String>,
    /// Composable-GPU request of container 0, the only container the
    /// resource contract covers.
    pub gpu_request: i64,
}

impl Pod {
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Whether the scheduler marked this pod as a composable-GPU user.
    pub fn uses_falcon(&self) -> bool {
        self.annotation(annotations::USE_FALCON) == Some("true")
    }

    /// `namespace/name`, for logs.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// A pod-scoped orchestrator event, already filtered to kind `Pod` by the
/// stream implementation.
#[derive(Debug, Clone)]
pub struct PodEvent {
    pub reason: String,
    pub pod_name: String,
    pub pod_namespace: String,
}
