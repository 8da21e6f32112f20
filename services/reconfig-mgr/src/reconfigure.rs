//! Quiescence and fabric mutation.
//!
//! Before moving any device the daemon must know which devices are in
//! use. It enumerates the cluster until every non-ignored pod is either
//! terminal or has its device bindings recorded; only then are donors
//! selected and the registry rewritten.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use falcon_cluster::contract::{annotations, container_env};
use falcon_cluster::{ClusterApi, Pod, PodEvent, PodPhase};
use falcon_pool_api::PoolClient;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Sentinel recorded when exec into a pod fails or reports no devices.
/// Such a pod is treated as using no devices, so its devices can be
/// stolen from under it.
const UNKNOWN_GIDS: &str = "-1";

#[derive(Debug, Error)]
pub enum ReconfigureError {
    /// The cluster did not quiesce within the configured bound.
    #[error("cluster did not quiesce within {timeout:?}, blocked on pod {blocking_pod}")]
    QuiesceTimeout {
        timeout: Duration,
        blocking_pod: String,
    },
}

/// Timing of the quiescence wait.
#[derive(Debug, Clone)]
pub struct QuiesceConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for QuiesceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Device bindings recorded for a tracked pod.
struct TrackedPod {
    name: String,
    namespace: String,
    /// DevIDs read from the pod's `DISAG_DEVICES`, or the unknown
    /// sentinel.
    gids: Vec<String>,
}

/// Runs one reconfiguration at a time against the registry.
pub struct Reconfigurer<C> {
    cluster: C,
    pool: PoolClient,
    /// Fabric attach point per node name, from deployment config.
    node_ports: HashMap<String, String>,
    /// Last-seen `devid -> hostport` view of the registry.
    device_alloc: HashMap<String, String>,
    /// Pods known to never matter again: non-falcon or terminal.
    ignore_pods: HashSet<String>,
    /// Device bindings per tracked pod uid.
    tracked: HashMap<String, TrackedPod>,
    quiesce: QuiesceConfig,
}

impl<C: ClusterApi> Reconfigurer<C> {
    pub fn new(
        cluster: C,
        pool: PoolClient,
        node_ports: HashMap<String, String>,
        quiesce: QuiesceConfig,
    ) -> Self {
        Self {
            cluster,
            pool,
            node_ports,
            device_alloc: HashMap::new(),
            ignore_pods: HashSet::new(),
            tracked: HashMap::new(),
            quiesce,
        }
    }

    /// Handle one `Reconfig` trigger end to end.
    pub async fn handle_event(&mut self, event: &PodEvent) {
        let pod = match self
            .cluster
            .get_pod(&event.pod_namespace, &event.pod_name)
            .await
        {
            Ok(pod) => pod,
            Err(e) => {
                debug!(
                    pod = %format!("{}/{}", event.pod_namespace, event.pod_name),
                    error = %e,
                    "Trigger pod gone, skipping"
                );
                return;
            }
        };
        if pod.phase != PodPhase::Pending {
            // Already scheduled (or done) by the time we got here.
            return;
        }

        info!(pod = %pod.full_name(), "Reconfig event detected");

        if let Err(e) = self.wait_ready(&pod).await {
            warn!(pod = %pod.full_name(), error = %e, "Aborting reconfiguration");
            return;
        }

        // Annotations are re-read after quiescence; permit wrote them
        // before emitting the event.
        let annotated = match self.cluster.get_pod(&pod.namespace, &pod.name).await {
            Ok(p) => p,
            Err(e) => {
                warn!(pod = %pod.full_name(), error = %e, "Trigger pod vanished after quiescence");
                return;
            }
        };
        let dst_node = annotated
            .annotation(annotations::DST_NODE)
            .unwrap_or_default()
            .to_string();
        let demand: i64 = match annotated
            .annotation(annotations::GPU_DEMAND)
            .unwrap_or_default()
            .parse()
        {
            Ok(demand) => demand,
            Err(e) => {
                warn!(pod = %pod.full_name(), error = %e, "Invalid GPU demand annotation");
                return;
            }
        };

        if !self.reconfigure(&dst_node, demand).await {
            warn!(
                pod = %pod.full_name(),
                dst_node = %dst_node,
                demand,
                "Failed to satisfy GPU demand"
            );
        }
    }

    /// Wait until every non-ignored pod besides the trigger is either
    /// terminal or has its device bindings recorded.
    ///
    /// Each pass enumerates all pods. Pods that do not use composable
    /// GPUs and terminal pods go to the ignore set; running falcon pods
    /// get their `DISAG_DEVICES` read once via exec; a pending scheduled
    /// pod keeps the cluster non-quiet. The recorded in-use set ends up
    /// a superset of ground truth.
    async fn wait_ready(&mut self, trigger: &Pod) -> Result<(), ReconfigureError> {
        let deadline = tokio::time::Instant::now() + self.quiesce.timeout;
        let mut blocking_pod = String::new();

        loop {
            let pods = match self.cluster.list_pods().await {
                Ok(pods) => pods,
                Err(e) => {
                    warn!(error = %e, "Failed to list pods, retrying");
                    if tokio::time::Instant::now() >= deadline {
                        return Err(ReconfigureError::QuiesceTimeout {
                            timeout: self.quiesce.timeout,
                            blocking_pod,
                        });
                    }
                    tokio::time::sleep(self.quiesce.poll_interval).await;
                    continue;
                }
            };

            let mut ready = true;
            for pod in &pods {
                if self.ignore_pods.contains(&pod.uid) {
                    continue;
                }
                if pod.name == trigger.name && pod.namespace == trigger.namespace {
                    continue;
                }
                if !pod.scheduled {
                    continue;
                }
                if !pod.uses_falcon() {
                    self.ignore_pods.insert(pod.uid.clone());
                    continue;
                }
                if pod.phase.is_terminal() {
                    self.ignore_pods.insert(pod.uid.clone());
                    self.tracked.remove(&pod.uid);
                    continue;
                }

                if pod.phase == PodPhase::Running && !self.has_gids(&pod.uid) {
                    let gids = self.read_gids(pod).await;
                    debug!(pod = %pod.full_name(), ?gids, "Recorded device bindings");
                    self.tracked.insert(
                        pod.uid.clone(),
                        TrackedPod {
                            name: pod.name.clone(),
                            namespace: pod.namespace.clone(),
                            gids,
                        },
                    );
                } else if pod.phase == PodPhase::Pending {
                    info!(pod = %pod.full_name(), "Not ready due to pending pod");
                    blocking_pod = pod.full_name();
                    ready = false;
                }
            }

            if ready {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ReconfigureError::QuiesceTimeout {
                    timeout: self.quiesce.timeout,
                    blocking_pod,
                });
            }
            tokio::time::sleep(self.quiesce.poll_interval).await;
        }
    }

    fn has_gids(&self, uid: &str) -> bool {
        self.tracked.get(uid).is_some_and(|t| !t.gids.is_empty())
    }

    /// Read `DISAG_DEVICES` from a running pod. Exec failure and empty
    /// output both collapse to the unknown sentinel, which makes the pod
    /// look device-free.
    async fn read_gids(&self, pod: &Pod) -> Vec<String> {
        let value = match self
            .cluster
            .read_container_env(&pod.namespace, &pod.name, container_env::DISAG_DEVICES)
            .await
        {
            Ok(value) => value,
            Err(e) => {
                warn!(pod = %pod.full_name(), error = %e, "Failed to exec into pod");
                return vec![UNKNOWN_GIDS.to_string()];
            }
        };

        if value.is_empty() {
            return vec![UNKNOWN_GIDS.to_string()];
        }
        value.split(',').map(str::to_string).collect()
    }

    /// Refresh the `devid -> hostport` view from the registry.
    async fn update_devices(&mut self) -> falcon_pool_api::Result<()> {
        let devices = self.pool.list().await?;
        for device in devices {
            self.device_alloc.insert(device.devid, device.hostport);
        }
        Ok(())
    }

    /// Move idle donors onto `node_name`'s port until `demand` is
    /// covered. Returns whether the demand reached zero.
    pub async fn reconfigure(&mut self, node_name: &str, demand: i64) -> bool {
        info!(node = node_name, demand, "Reconfiguring");

        if let Err(e) = self.update_devices().await {
            warn!(error = %e, "Failed to update devices");
            return false;
        }

        let Some(dst_port) = self.node_ports.get(node_name).cloned() else {
            warn!(node = node_name, "No host port configured for node");
            return false;
        };

        let used: HashSet<&str> = self
            .tracked
            .values()
            .flat_map(|t| t.gids.iter().map(String::as_str))
            .collect();

        let donors = select_donors(&self.device_alloc, &used, &dst_port);

        let mut remaining = demand;
        for donor in donors {
            if remaining <= 0 {
                break;
            }

            if let Err(e) = self.pool.detach(&donor.devid).await {
                warn!(devid = %donor.devid, error = %e, "Detach failed, skipping donor");
                continue;
            }
            if let Err(e) = self.pool.attach(&donor.devid, &dst_port).await {
                // The device is now unattached; the next poll reflects
                // reality and no compensating action is taken.
                warn!(devid = %donor.devid, error = %e, "Attach failed, skipping donor");
                continue;
            }

            info!(
                devid = %donor.devid,
                from = %donor.hostport,
                to = %dst_port,
                "Moved device"
            );
            remaining -= 1;
        }

        remaining == 0
    }

    /// Pods currently tracked with their recorded bindings, for logs and
    /// tests.
    pub fn tracked_pods(&self) -> Vec<(String, String, Vec<String>)> {
        self.tracked
            .values()
            .map(|t| (t.namespace.clone(), t.name.clone(), t.gids.clone()))
            .collect()
    }
}

/// A movable device and where it currently sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Donor {
    pub devid: String,
    pub hostport: String,
    /// Number of candidate siblings on the same port.
    pub score: usize,
}

/// Candidates are devices neither in use nor already on the destination
/// port, ordered ascending by how many candidate siblings share their
/// port: taking from sparsely-populated donors keeps large contiguous
/// pools intact.
pub fn select_donors(
    device_alloc: &HashMap<String, String>,
    used: &HashSet<&str>,
    dst_port: &str,
) -> Vec<Donor> {
    let mut donors: Vec<Donor> = device_alloc
        .iter()
        .filter(|(devid, hostport)| {
            !used.contains(devid.as_str()) && hostport.as_str() != dst_port
        })
        .map(|(devid, hostport)| Donor {
            devid: devid.clone(),
            hostport: hostport.clone(),
            score: 0,
        })
        .collect();

    let mut group_sizes: HashMap<&str, usize> = HashMap::new();
    for donor in &donors {
        *group_sizes.entry(donor.hostport.as_str()).or_default() += 1;
    }
    let group_sizes: HashMap<String, usize> = group_sizes
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

    for donor in &mut donors {
        donor.score = group_sizes[&donor.hostport];
    }
    donors.sort_by(|a, b| a.score.cmp(&b.score));
    donors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(d, p)| (d.to_string(), p.to_string()))
            .collect()
    }

    #[test]
    fn donors_exclude_destination_and_in_use() {
        let device_alloc = alloc(&[
            ("gpu0", "port-a"),
            ("gpu1", "port-b"),
            ("gpu2", "port-b"),
        ]);
        let used = HashSet::from(["gpu1"]);

        let donors = select_donors(&device_alloc, &used, "port-a");
        assert_eq!(donors.len(), 1);
        assert_eq!(donors[0].devid, "gpu2");
    }

    #[test]
    fn donors_prefer_sparse_ports() {
        let device_alloc = alloc(&[
            ("gpu0", "port-b"),
            ("gpu1", "port-c"),
            ("gpu2", "port-c"),
            ("gpu3", "port-c"),
        ]);
        let used = HashSet::new();

        let donors = select_donors(&device_alloc, &used, "port-a");
        assert_eq!(donors.len(), 4);
        // The lone device on port-b is taken before the contiguous pool
        // on port-c is broken up.
        assert_eq!(donors[0].devid, "gpu0");
        assert_eq!(donors[0].score, 1);
        assert!(donors[1..].iter().all(|d| d.score == 3));
    }

    #[test]
    fn unattached_devices_are_candidates() {
        let device_alloc = alloc(&[("gpu0", ""), ("gpu1", "port-a")]);
        let used = HashSet::new();

        let donors = select_donors(&device_alloc, &used, "port-a");
        assert_eq!(donors.len(), 1);
        assert_eq!(donors[0].devid, "gpu0");
    }
}
