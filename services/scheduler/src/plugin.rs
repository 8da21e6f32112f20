//! The FalconResources plugin.

use std::collections::BTreeMap;
use std::time::Duration;

use falcon_cluster::contract::{annotations, RECONFIG_EVENT_REASON};
use falcon_cluster::{ClusterApi, Pod};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::framework::{NodeInfo, NodeScore, Status, MAX_NODE_SCORE, MIN_NODE_SCORE};

/// Timing of the permit gate.
///
/// The window is `setup_floor + demand * per_device`: the floor covers
/// reconfiguration setup overhead, the linear term bounds the daemon's
/// expected per-device work.
#[derive(Debug, Clone)]
pub struct PermitConfig {
    pub setup_floor: Duration,
    pub per_device: Duration,
    pub poll_interval: Duration,
}

impl Default for PermitConfig {
    fn default() -> Self {
        Self {
            setup_floor: Duration::from_secs(15),
            per_device: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Placement plugin treating the GPU as a composable device.
pub struct FalconResources<C> {
    cluster: C,
    permit_config: PermitConfig,
}

impl<C: ClusterApi> FalconResources<C> {
    pub fn new(cluster: C) -> Self {
        Self::with_permit_config(cluster, PermitConfig::default())
    }

    pub fn with_permit_config(cluster: C, permit_config: PermitConfig) -> Self {
        Self {
            cluster,
            permit_config,
        }
    }

    /// Admit or reject on cluster-wide supply, and mark the pod as a
    /// composable-GPU user for the reconfiguration daemon.
    ///
    /// No amount of reconfiguration can manufacture devices, so a request
    /// exceeding the whole pool's free supply is rejected before scoring.
    pub async fn pre_filter(&self, pod: &Pod, snapshot: &[NodeInfo]) -> Status {
        let required = pod.gpu_request;
        let total: i64 = snapshot.iter().map(NodeInfo::free).sum();

        info!(
            pod = %pod.full_name(),
            required,
            total,
            "PreFilter supply check"
        );

        if total < required {
            return Status::unschedulable(format!(
                "pod {} requires {} GPU but only {} GPU in the pool",
                pod.name, required, total
            ));
        }

        let use_falcon = if required > 0 { "true" } else { "false" };
        let patch = BTreeMap::from([(
            annotations::USE_FALCON.to_string(),
            use_falcon.to_string(),
        )]);
        if let Err(e) = self
            .cluster
            .patch_pod_annotations(&pod.namespace, &pod.name, patch)
            .await
        {
            return Status::error(format!("failed to patch pod annotations: {e}"));
        }

        Status::success()
    }

    /// Raw score of one feasible node.
    ///
    /// Free supply above the request degrades with waste, an exact fit is
    /// perfect, and a deficit goes negative with its size - still
    /// feasible, the fabric can close it, but dominated by any node that
    /// needs no reconfiguration.
    pub fn score(&self, pod: &Pod, node: &NodeInfo) -> i64 {
        let required = pod.gpu_request;
        let local = node.free();

        let score = if local > required {
            required * 100 / local
        } else if local == required {
            100
        } else {
            local - required
        };

        info!(
            node = %node.name,
            local,
            pod = %pod.full_name(),
            required,
            score,
            "Scored node"
        );
        score
    }

    /// Map raw scores linearly into the framework's score range,
    /// preserving their relative shape. A degenerate range collapses to
    /// the minimum.
    pub fn normalize_score(&self, scores: &mut [NodeScore]) {
        let Some(highest) = scores.iter().map(|s| s.score).max() else {
            return;
        };
        let lowest = scores.iter().map(|s| s.score).min().unwrap_or(highest);

        let old_range = highest - lowest;
        let new_range = MAX_NODE_SCORE - MIN_NODE_SCORE;
        for entry in scores.iter_mut() {
            entry.score = if old_range == 0 {
                MIN_NODE_SCORE
            } else {
                (entry.score - lowest) * new_range / old_range + MIN_NODE_SCORE
            };
        }
    }

    /// Gate admission on the chosen node until its local supply covers
    /// the request.
    ///
    /// The deficit is recomputed from a fresh allocatable read - the
    /// cycle snapshot can lag a reconfiguration that already happened.
    /// When a deficit remains, the pod is annotated with destination and
    /// demand and a `Reconfig` event is emitted; the annotations are
    /// visible before the event by construction. A cancelled cycle
    /// short-circuits the poll.
    pub async fn permit(&self, pod: &Pod, node: &NodeInfo, cancel: &CancellationToken) -> Status {
        let demand = self.gpu_demand(pod, node).await;
        if demand <= 0 {
            return Status::success();
        }

        let patch = BTreeMap::from([
            (annotations::DST_NODE.to_string(), node.name.clone()),
            (annotations::GPU_DEMAND.to_string(), demand.to_string()),
        ]);
        if let Err(e) = self
            .cluster
            .patch_pod_annotations(&pod.namespace, &pod.name, patch)
            .await
        {
            return Status::error(format!("failed to patch pod annotations: {e}"));
        }

        if let Err(e) = self
            .cluster
            .emit_pod_event(
                &pod.namespace,
                &pod.name,
                RECONFIG_EVENT_REASON,
                &format!("Pod {} needs reconfiguration", pod.name),
            )
            .await
        {
            warn!(pod = %pod.full_name(), error = %e, "Failed to emit Reconfig event");
        }

        let window = self.permit_config.setup_floor
            + self.permit_config.per_device * demand as u32;
        info!(
            pod = %pod.full_name(),
            node = %node.name,
            demand,
            window_secs = window.as_secs(),
            "Waiting for reconfiguration"
        );

        let poll = async {
            let mut interval = tokio::time::interval(self.permit_config.poll_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Status::unschedulable("scheduling cycle cancelled");
                    }
                    _ = interval.tick() => {
                        if self.gpu_demand(pod, node).await == 0 {
                            return Status::success();
                        }
                    }
                }
            }
        };

        match tokio::time::timeout(window, poll).await {
            Ok(status) => status,
            Err(_) => Status::unschedulable(format!(
                "node {} still lacks {} GPU after reconfiguration window",
                node.name, demand
            )),
        }
    }

    /// Shortfall on a node: request minus (fresh allocatable minus
    /// snapshot requested), floored at zero. Read failures count as no
    /// demand so a flaky API read cannot gate a schedulable pod.
    async fn gpu_demand(&self, pod: &Pod, node: &NodeInfo) -> i64 {
        let allocatable = match self.cluster.node_allocatable_gpus(&node.name).await {
            Ok(allocatable) => allocatable,
            Err(e) => {
                warn!(node = %node.name, error = %e, "Failed to read node allocatable");
                return 0;
            }
        };

        (pod.gpu_request - (allocatable - node.requested)).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use falcon_cluster::mock::MockCluster;
    use falcon_cluster::PodPhase;

    fn pod_requesting(gpus: i64) -> Pod {
        Pod {
            uid: "uid-0".to_string(),
            name: "workload".to_string(),
            namespace: "default".to_string(),
            phase: PodPhase::Pending,
            scheduled: false,
            annotations: BTreeMap::new(),
            gpu_request: gpus,
        }
    }

    fn plugin() -> FalconResources<MockCluster> {
        FalconResources::new(MockCluster::new())
    }

    #[test]
    fn score_prefers_exact_fit() {
        let plugin = plugin();
        let pod = pod_requesting(2);

        assert_eq!(plugin.score(&pod, &NodeInfo::new("n", 2, 0)), 100);
        assert_eq!(plugin.score(&pod, &NodeInfo::new("n", 4, 0)), 50);
        assert_eq!(plugin.score(&pod, &NodeInfo::new("n", 8, 0)), 25);
        assert_eq!(plugin.score(&pod, &NodeInfo::new("n", 1, 0)), -1);
        assert_eq!(plugin.score(&pod, &NodeInfo::new("n", 0, 0)), -2);
    }

    #[test]
    fn score_counts_requested_supply() {
        let plugin = plugin();
        let pod = pod_requesting(2);

        // 4 allocatable with 2 already requested is an exact fit.
        assert_eq!(plugin.score(&pod, &NodeInfo::new("n", 4, 2)), 100);
    }

    #[test]
    fn normalize_maps_into_framework_range() {
        let plugin = plugin();
        let mut scores = vec![
            NodeScore {
                name: "a".into(),
                score: -3,
            },
            NodeScore {
                name: "b".into(),
                score: 50,
            },
            NodeScore {
                name: "c".into(),
                score: 100,
            },
        ];

        plugin.normalize_score(&mut scores);

        assert!(scores
            .iter()
            .all(|s| s.score >= MIN_NODE_SCORE && s.score <= MAX_NODE_SCORE));
        assert_eq!(scores[0].score, MIN_NODE_SCORE);
        assert_eq!(scores[2].score, MAX_NODE_SCORE);
        assert!(scores[1].score > scores[0].score);
        assert!(scores[1].score < scores[2].score);
    }

    #[test]
    fn normalize_collapses_zero_range() {
        let plugin = plugin();
        let mut scores = vec![
            NodeScore {
                name: "a".into(),
                score: 100,
            },
            NodeScore {
                name: "b".into(),
                score: 100,
            },
        ];

        plugin.normalize_score(&mut scores);

        assert!(scores.iter().all(|s| s.score == MIN_NODE_SCORE));
    }

    #[test]
    fn normalize_handles_empty_input() {
        let plugin = plugin();
        let mut scores: Vec<NodeScore> = Vec::new();
        plugin.normalize_score(&mut scores);
        assert!(scores.is_empty());
    }
}
