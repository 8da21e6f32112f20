//! Poller integration tests against a live registry instance.

use std::time::Duration;

use falcon_device_plugin::{inventory::Inventory, poller::Poller};
use falcon_pool_api::PoolClient;
use falcon_resource_pool::{api, manifest, registry::Registry, state::AppState};
use tokio::net::TcpListener;

/// Boot a registry seeded from `manifest_text`, returning its base URL.
async fn start_pool(manifest_text: &str) -> String {
    let devices = manifest::parse(manifest_text).expect("manifest fixture must parse");
    let state = AppState::new(Registry::new(devices));
    let app = api::create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

fn poller_for(base_url: &str, host_port: &str, inventory: Inventory) -> Poller {
    Poller::new(
        PoolClient::list_only(format!("{base_url}/resources")),
        host_port.to_string(),
        Duration::from_secs(1),
        inventory,
    )
}

#[tokio::test]
async fn advertises_only_local_devices_sorted_by_uuid() {
    let base_url = start_pool("gpu0,port-a\ngpu1,port-b\ngpu2,port-a\ngpu3,").await;
    let inventory = Inventory::new();
    let poller = poller_for(&base_url, "port-a", inventory.clone());

    poller.poll_once().await;

    let advertised = inventory.current();
    assert_eq!(advertised.len(), 2);
    let devids: Vec<_> = advertised.iter().map(|d| d.devid.as_str()).collect();
    assert!(devids.contains(&"gpu0"));
    assert!(devids.contains(&"gpu2"));
    assert!(advertised.iter().all(|d| d.healthy));
    assert!(advertised[0].uuid <= advertised[1].uuid, "sorted by uuid");
}

#[tokio::test]
async fn repolls_track_registry_mutations() {
    let base_url = start_pool("gpu0,port-a\ngpu1,port-b").await;
    let inventory = Inventory::new();
    let poller = poller_for(&base_url, "port-a", inventory.clone());
    let mutator = PoolClient::new(
        format!("{base_url}/resources"),
        format!("{base_url}/allocation"),
    );

    poller.poll_once().await;
    assert_eq!(inventory.current().len(), 1);

    // Fabric moves gpu1 onto this node.
    mutator.detach("gpu1").await.unwrap();
    mutator.attach("gpu1", "port-a").await.unwrap();

    poller.poll_once().await;
    assert_eq!(inventory.current().len(), 2);

    // And takes gpu0 away again.
    mutator.detach("gpu0").await.unwrap();

    poller.poll_once().await;
    let advertised = inventory.current();
    assert_eq!(advertised.len(), 1);
    assert_eq!(advertised[0].devid, "gpu1");
}

#[tokio::test]
async fn unchanged_polls_publish_nothing() {
    let base_url = start_pool("gpu0,port-a").await;
    let inventory = Inventory::new();
    let poller = poller_for(&base_url, "port-a", inventory.clone());
    let mut rx = inventory.subscribe();

    poller.poll_once().await;
    rx.changed().await.unwrap();
    rx.borrow_and_update();

    poller.poll_once().await;
    poller.poll_once().await;
    assert!(
        !rx.has_changed().unwrap(),
        "identical polls must not re-advertise"
    );
}

#[tokio::test]
async fn failed_poll_keeps_last_advertisement() {
    let base_url = start_pool("gpu0,port-a").await;
    let inventory = Inventory::new();
    let poller = poller_for(&base_url, "port-a", inventory.clone());

    poller.poll_once().await;
    assert_eq!(inventory.current().len(), 1);

    // A poller pointed at a dead registry must never shrink the view.
    let dead = poller_for("http://127.0.0.1:9", "port-a", inventory.clone());
    dead.poll_once().await;
    assert_eq!(inventory.current().len(), 1);
}
