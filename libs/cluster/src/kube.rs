//! Kubernetes-backed orchestrator adapter.
//!
//! Wraps a `kube::Client` behind the adapter traits. Pod-scoped events are
//! consumed through a watcher with a field selector on the involved
//! object's kind, so the daemon never sees node or volume events.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Event as CoreEvent, Node, ObjectReference, Pod as CorePod};
use kube::api::{AttachParams, ListParams, Patch, PatchParams, PostParams};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::contract;
use crate::traits::{ClusterApi, EventStream};
use crate::types::{Pod, PodEvent, PodPhase};
use crate::{ClusterError, Result};

/// `ClusterApi` over an in-cluster (or kubeconfig) Kubernetes client.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Connect using the in-cluster service account, falling back to the
    /// local kubeconfig.
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default().await.map_err(api_err)?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Open the cluster-wide stream of pod-scoped events.
    pub fn pod_events(&self) -> KubeEventStream {
        let api: Api<CoreEvent> = Api::all(self.client.clone());
        let config = watcher::Config::default().fields("involvedObject.kind=Pod");
        let stream = watcher(api, config).applied_objects().boxed();
        KubeEventStream { stream }
    }

    fn pods(&self, namespace: &str) -> Api<CorePod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn api_err(err: kube::Error) -> ClusterError {
    ClusterError::Api(err.to_string())
}

fn convert_pod(pod: CorePod) -> Pod {
    let meta = pod.metadata;
    let status = pod.status.unwrap_or_default();

    let phase = match status.phase.as_deref() {
        Some("Pending") => PodPhase::Pending,
        Some("Running") => PodPhase::Running,
        Some("Succeeded") => PodPhase::Succeeded,
        Some("Failed") => PodPhase::Failed,
        _ => PodPhase::Unknown,
    };

    let scheduled = status
        .conditions
        .unwrap_or_default()
        .iter()
        .any(|c| c.type_ == "PodScheduled" && c.status == "True");

    // The resource contract covers container 0 only.
    let gpu_request = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.containers.first())
        .and_then(|c| c.resources.as_ref())
        .and_then(|r| r.requests.as_ref())
        .and_then(|req| req.get(contract::GPU_RESOURCE_NAME))
        .and_then(|q| q.0.parse::<i64>().ok())
        .unwrap_or(0);

    Pod {
        uid: meta.uid.unwrap_or_default(),
        name: meta.name.unwrap_or_default(),
        namespace: meta.namespace.unwrap_or_default(),
        phase,
        scheduled,
        annotations: meta.annotations.unwrap_or_default(),
        gpu_request,
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_pods(&self) -> Result<Vec<Pod>> {
        let api: Api<CorePod> = Api::all(self.client.clone());
        let pods = api.list(&ListParams::default()).await.map_err(api_err)?;
        Ok(pods.items.into_iter().map(convert_pod).collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        match self.pods(namespace).get(name).await {
            Ok(pod) => Ok(convert_pod(pod)),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Err(ClusterError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Err(err) => Err(api_err(err)),
        }
    }

    async fn patch_pod_annotations(
        &self,
        namespace: &str,
        name: &str,
        annotations: BTreeMap<String, String>,
    ) -> Result<()> {
        let patch = serde_json::json!({
            "metadata": { "annotations": annotations }
        });
        self.pods(namespace)
            .patch(name, &PatchParams::default(), &Patch::Strategic(patch))
            .await
            .map_err(api_err)?;
        Ok(())
    }

    async fn emit_pod_event(
        &self,
        namespace: &str,
        name: &str,
        reason: &str,
        message: &str,
    ) -> Result<()> {
        let pod = self.pods(namespace).get(name).await.map_err(api_err)?;
        let event = CoreEvent {
            metadata: kube::api::ObjectMeta {
                generate_name: Some(format!("{name}.")),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            involved_object: ObjectReference {
                kind: Some("Pod".to_string()),
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                uid: pod.metadata.uid,
                ..Default::default()
            },
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            type_: Some("Normal".to_string()),
            ..Default::default()
        };
        let api: Api<CoreEvent> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), &event)
            .await
            .map_err(api_err)?;
        Ok(())
    }

    async fn read_container_env(&self, namespace: &str, name: &str, var: &str) -> Result<String> {
        let exec_err = |message: String| ClusterError::Exec {
            namespace: namespace.to_string(),
            name: name.to_string(),
            message,
        };

        let params = AttachParams::default().stdout(true).stderr(false);
        let command = vec!["sh".to_string(), "-c".to_string(), format!("echo ${var}")];
        let mut process = self
            .pods(namespace)
            .exec(name, command, &params)
            .await
            .map_err(|e| exec_err(e.to_string()))?;

        let mut stdout = process
            .stdout()
            .ok_or_else(|| exec_err("no stdout stream".to_string()))?;
        let mut output = Vec::new();
        stdout
            .read_to_end(&mut output)
            .await
            .map_err(|e| exec_err(e.to_string()))?;
        process.join().await.map_err(|e| exec_err(e.to_string()))?;

        let value = String::from_utf8_lossy(&output);
        Ok(value.trim_end_matches('\n').to_string())
    }

    async fn node_allocatable_gpus(&self, node_name: &str) -> Result<i64> {
        let api: Api<Node> = Api::all(self.client.clone());
        let node = api.get(node_name).await.map_err(api_err)?;
        let gpus = node
            .status
            .and_then(|s| s.allocatable)
            .and_then(|alloc| alloc.get(contract::GPU_RESOURCE_NAME).cloned())
            .and_then(|q| q.0.parse::<i64>().ok())
            .unwrap_or(0);
        debug!(node = node_name, gpus, "Read node allocatable");
        Ok(gpus)
    }
}

/// Watcher-backed stream of pod-scoped events.
pub struct KubeEventStream {
    stream: BoxStream<'static, std::result::Result<CoreEvent, watcher::Error>>,
}

#[async_trait]
impl EventStream for KubeEventStream {
    async fn next_event(&mut self) -> Result<Option<PodEvent>> {
        match self.stream.next().await {
            Some(Ok(event)) => {
                let involved = event.involved_object;
                Ok(Some(PodEvent {
                    reason: event.reason.unwrap_or_default(),
                    pod_name: involved.name.unwrap_or_default(),
                    pod_namespace: involved.namespace.unwrap_or_default(),
                }))
            }
            Some(Err(err)) => Err(ClusterError::Api(err.to_string())),
            None => Ok(None),
        }
    }
}
