//! Scheduling cycle tests against the mock orchestrator.

use std::collections::BTreeMap;
use std::time::Duration;

use falcon_cluster::contract::annotations;
use falcon_cluster::mock::MockCluster;
use falcon_cluster::{ClusterApi, EventStream, Pod, PodPhase};
use falcon_scheduler::framework::{Code, NodeInfo};
use falcon_scheduler::{FalconResources, PermitConfig};
use tokio_util::sync::CancellationToken;

fn pending_pod(uid: &str, name: &str, gpus: i64) -> Pod {
    Pod {
        uid: uid.to_string(),
        name: name.to_string(),
        namespace: "default".to_string(),
        phase: PodPhase::Pending,
        scheduled: false,
        annotations: BTreeMap::new(),
        gpu_request: gpus,
    }
}

fn fast_permit() -> PermitConfig {
    PermitConfig {
        setup_floor: Duration::from_millis(300),
        per_device: Duration::from_millis(100),
        poll_interval: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn sufficient_local_supply_admits_without_reconfig() {
    let cluster = MockCluster::new();
    let pod = pending_pod("u1", "workload", 2);
    cluster.add_pod(pod.clone()).await;
    cluster.set_node_allocatable("n1", 2).await;

    let plugin = FalconResources::new(cluster.clone());
    let snapshot = vec![NodeInfo::new("n1", 2, 0)];

    let status = plugin.pre_filter(&pod, &snapshot).await;
    assert!(status.is_success());
    let annotated = cluster.get_pod("default", "workload").await.unwrap();
    assert_eq!(annotated.annotation(annotations::USE_FALCON), Some("true"));

    assert_eq!(plugin.score(&pod, &snapshot[0]), 100);

    let status = plugin
        .permit(&pod, &snapshot[0], &CancellationToken::new())
        .await;
    assert!(status.is_success());

    // No reconfiguration was needed, so no event was emitted.
    assert!(cluster.emitted_events().await.is_empty());
}

#[tokio::test]
async fn cluster_wide_deficit_rejects_before_scoring() {
    let cluster = MockCluster::new();
    let pod = pending_pod("u1", "workload", 2);
    cluster.add_pod(pod.clone()).await;

    let plugin = FalconResources::new(cluster.clone());
    let snapshot = vec![NodeInfo::new("n1", 1, 0), NodeInfo::new("n2", 2, 2)];

    let status = plugin.pre_filter(&pod, &snapshot).await;
    assert_eq!(status.code, Code::Unschedulable);

    // Rejection happens before the annotation patch.
    let fetched = cluster.get_pod("default", "workload").await.unwrap();
    assert_eq!(fetched.annotation(annotations::USE_FALCON), None);
}

#[tokio::test]
async fn pod_without_gpu_request_is_marked_non_falcon() {
    let cluster = MockCluster::new();
    let pod = pending_pod("u1", "web", 0);
    cluster.add_pod(pod.clone()).await;

    let plugin = FalconResources::new(cluster.clone());
    let status = plugin.pre_filter(&pod, &[NodeInfo::new("n1", 1, 0)]).await;
    assert!(status.is_success());

    let fetched = cluster.get_pod("default", "web").await.unwrap();
    assert_eq!(fetched.annotation(annotations::USE_FALCON), Some("false"));
}

#[tokio::test]
async fn permit_gates_until_reconfiguration_closes_deficit() {
    let cluster = MockCluster::new();
    let pod = pending_pod("u1", "workload", 2);
    cluster.add_pod(pod.clone()).await;
    cluster.set_node_allocatable("n1", 1).await;

    let plugin = FalconResources::with_permit_config(cluster.clone(), fast_permit());
    let node = NodeInfo::new("n1", 1, 0);

    // A background "daemon" closes the deficit shortly after the gate
    // opens.
    let fabric = cluster.clone();
    let daemon = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        fabric.set_node_allocatable("n1", 2).await;
    });

    let status = plugin
        .permit(&pod, &node, &CancellationToken::new())
        .await;
    assert!(status.is_success());
    daemon.await.unwrap();

    let annotated = cluster.get_pod("default", "workload").await.unwrap();
    assert_eq!(annotated.annotation(annotations::DST_NODE), Some("n1"));
    assert_eq!(annotated.annotation(annotations::GPU_DEMAND), Some("1"));

    let events = cluster.emitted_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, "Reconfig");
    assert_eq!(events[0].pod_name, "workload");
}

#[tokio::test]
async fn permit_annotations_are_visible_before_the_event() {
    let cluster = MockCluster::new();
    let pod = pending_pod("u1", "workload", 1);
    cluster.add_pod(pod.clone()).await;
    cluster.set_node_allocatable("n1", 0).await;

    let mut stream = cluster.event_stream();
    let observer = {
        let cluster = cluster.clone();
        tokio::spawn(async move {
            let event = stream.next_event().await.unwrap().unwrap();
            assert_eq!(event.reason, "Reconfig");
            // The side channel must already be populated when the event
            // lands.
            let pod = cluster.get_pod("default", "workload").await.unwrap();
            assert_eq!(pod.annotation(annotations::DST_NODE), Some("n1"));
            assert_eq!(pod.annotation(annotations::GPU_DEMAND), Some("1"));
        })
    };

    let plugin = FalconResources::with_permit_config(cluster.clone(), fast_permit());
    let status = plugin
        .permit(&pod, &NodeInfo::new("n1", 0, 0), &CancellationToken::new())
        .await;
    assert_eq!(status.code, Code::Unschedulable);

    observer.await.unwrap();
}

#[tokio::test]
async fn permit_times_out_when_nothing_reconfigures() {
    let cluster = MockCluster::new();
    let pod = pending_pod("u1", "workload", 3);
    cluster.add_pod(pod.clone()).await;
    cluster.set_node_allocatable("n1", 1).await;

    let plugin = FalconResources::with_permit_config(cluster.clone(), fast_permit());
    let status = plugin
        .permit(&pod, &NodeInfo::new("n1", 1, 0), &CancellationToken::new())
        .await;
    assert_eq!(status.code, Code::Unschedulable);
}

#[tokio::test]
async fn cancelled_cycle_short_circuits_permit() {
    let cluster = MockCluster::new();
    let pod = pending_pod("u1", "workload", 2);
    cluster.add_pod(pod.clone()).await;
    cluster.set_node_allocatable("n1", 0).await;

    let permit_config = PermitConfig {
        setup_floor: Duration::from_secs(60),
        ..fast_permit()
    };
    let plugin = FalconResources::with_permit_config(cluster.clone(), permit_config);

    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let start = tokio::time::Instant::now();
    let status = plugin
        .permit(&pod, &NodeInfo::new("n1", 0, 0), &cancel)
        .await;
    assert_eq!(status.code, Code::Unschedulable);
    assert!(start.elapsed() < Duration::from_secs(5));
    canceller.await.unwrap();
}
