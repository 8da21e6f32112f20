//! In-memory orchestrator for tests and local development.
//!
//! The mock keeps the whole cluster - pods, node capacities, container
//! environments - in one locked state block, and fans emitted pod events
//! out to any number of subscribed streams. Tests drive it directly;
//! the daemon and scheduler only ever see the adapter traits.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};

use crate::traits::{ClusterApi, EventStream};
use crate::types::{Pod, PodEvent};
use crate::{ClusterError, Result};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct MockState {
    /// Pods keyed by uid.
    pods: BTreeMap<String, Pod>,
    /// Allocatable composable GPUs per node.
    node_allocatable: BTreeMap<String, i64>,
    /// Container environment per pod uid.
    container_env: BTreeMap<String, BTreeMap<String, String>>,
    /// Pod uids whose exec calls fail.
    exec_failures: BTreeSet<String>,
    /// Every event emitted through the api, oldest first.
    emitted: Vec<PodEvent>,
}

/// Shared in-memory cluster.
#[derive(Clone)]
pub struct MockCluster {
    state: Arc<Mutex<MockState>>,
    events: broadcast::Sender<PodEvent>,
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCluster {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            events,
        }
    }

    /// Subscribe a new event stream. Events emitted before the call are
    /// not replayed.
    pub fn event_stream(&self) -> MockEventStream {
        MockEventStream {
            rx: self.events.subscribe(),
        }
    }

    pub async fn add_pod(&self, pod: Pod) {
        self.state.lock().await.pods.insert(pod.uid.clone(), pod);
    }

    pub async fn remove_pod(&self, uid: &str) {
        let mut state = self.state.lock().await;
        state.pods.remove(uid);
        state.container_env.remove(uid);
    }

    pub async fn update_pod(&self, uid: &str, f: impl FnOnce(&mut Pod)) {
        let mut state = self.state.lock().await;
        if let Some(pod) = state.pods.get_mut(uid) {
            f(pod);
        }
    }

    pub async fn set_node_allocatable(&self, node: &str, gpus: i64) {
        self.state
            .lock()
            .await
            .node_allocatable
            .insert(node.to_string(), gpus);
    }

    pub async fn set_container_env(&self, uid: &str, var: &str, value: &str) {
        self.state
            .lock()
            .await
            .container_env
            .entry(uid.to_string())
            .or_default()
            .insert(var.to_string(), value.to_string());
    }

    /// Make exec into the given pod fail, as a crashed or shell-less
    /// container would.
    pub async fn fail_exec(&self, uid: &str) {
        self.state.lock().await.exec_failures.insert(uid.to_string());
    }

    /// Events emitted so far, oldest first.
    pub async fn emitted_events(&self) -> Vec<PodEvent> {
        self.state.lock().await.emitted.clone()
    }

    /// Inject an event as if some other controller emitted it.
    pub fn push_event(&self, event: PodEvent) {
        let _ = self.events.send(event);
    }

    async fn find_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.state
            .lock()
            .await
            .pods
            .values()
            .find(|p| p.namespace == namespace && p.name == name)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}

#[async_trait]
impl ClusterApi for MockCluster {
    async fn list_pods(&self) -> Result<Vec<Pod>> {
        Ok(self.state.lock().await.pods.values().cloned().collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.find_pod(namespace, name).await
    }

    async fn patch_pod_annotations(
        &self,
        namespace: &str,
        name: &str,
        annotations: BTreeMap<String, String>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let pod = state
            .pods
            .values_mut()
            .find(|p| p.namespace == namespace && p.name == name)
            .ok_or_else(|| ClusterError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
        pod.annotations.extend(annotations);
        Ok(())
    }

    async fn emit_pod_event(
        &self,
        namespace: &str,
        name: &str,
        reason: &str,
        _message: &str,
    ) -> Result<()> {
        let event = PodEvent {
            reason: reason.to_string(),
            pod_name: name.to_string(),
            pod_namespace: namespace.to_string(),
        };
        self.state.lock().await.emitted.push(event.clone());
        // Nobody listening is fine; tests often emit before subscribing.
        let _ = self.events.send(event);
        Ok(())
    }

    async fn read_container_env(&self, namespace: &str, name: &str, var: &str) -> Result<String> {
        let pod = self.find_pod(namespace, name).await?;
        let state = self.state.lock().await;
        if state.exec_failures.contains(&pod.uid) {
            return Err(ClusterError::Exec {
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: "exec refused".to_string(),
            });
        }
        Ok(state
            .container_env
            .get(&pod.uid)
            .and_then(|env| env.get(var))
            .cloned()
            .unwrap_or_default())
    }

    async fn node_allocatable_gpus(&self, node_name: &str) -> Result<i64> {
        self.state
            .lock()
            .await
            .node_allocatable
            .get(node_name)
            .copied()
            .ok_or_else(|| ClusterError::NotFound {
                namespace: String::new(),
                name: node_name.to_string(),
            })
    }
}

/// Event stream backed by the mock's broadcast channel.
pub struct MockEventStream {
    rx: broadcast::Receiver<PodEvent>,
}

#[async_trait]
impl EventStream for MockEventStream {
    async fn next_event(&mut self) -> Result<Option<PodEvent>> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Ok(Some(event)),
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    }
}
