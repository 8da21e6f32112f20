//! Registry API integration tests.
//!
//! Boots the real axum server on an ephemeral port and drives it over
//! HTTP the way the device plugin and the reconfiguration daemon do.

use std::collections::HashSet;

use falcon_pool_api::Device;
use falcon_resource_pool::{api, manifest, registry::Registry, state::AppState};
use tokio::net::TcpListener;

struct PoolHarness {
    base_url: String,
    client: reqwest::Client,
}

impl PoolHarness {
    async fn new(manifest_text: &str) -> Self {
        let devices = manifest::parse(manifest_text).expect("manifest fixture must parse");
        let state = AppState::new(Registry::new(devices));
        let app = api::create_router(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
        }
    }

    async fn list(&self) -> Vec<Device> {
        self.client
            .get(format!("{}/resources", self.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn attach(&self, devid: &str, hostport: &str) -> reqwest::StatusCode {
        self.client
            .post(format!("{}/allocation", self.base_url))
            .json(&serde_json::json!({ "devid": devid, "hostport": hostport }))
            .send()
            .await
            .unwrap()
            .status()
    }

    async fn detach(&self, devid: &str) -> reqwest::StatusCode {
        self.client
            .delete(format!("{}/allocation", self.base_url))
            .json(&serde_json::json!({ "devid": devid }))
            .send()
            .await
            .unwrap()
            .status()
    }
}

#[tokio::test]
async fn boot_and_list() {
    let pool = PoolHarness::new("a,p1\nb,\nc,p1").await;

    let devices = pool.list().await;
    assert_eq!(devices.len(), 3);
    assert_eq!(devices[0].devid, "a");
    assert_eq!(devices[1].devid, "b");
    assert_eq!(devices[1].hostport, "");
    assert_eq!(devices[2].hostport, "p1");

    let uuids: HashSet<_> = devices.iter().map(|d| d.uuid.clone()).collect();
    assert_eq!(uuids.len(), 3, "uuids must be distinct");
}

#[tokio::test]
async fn attach_requires_detach_first() {
    let pool = PoolHarness::new("a,p1").await;

    // Already attached at p1.
    assert_eq!(pool.attach("a", "p2").await, 400);

    assert_eq!(pool.detach("a").await, 204);
    assert_eq!(pool.attach("a", "p2").await, 204);

    let devices = pool.list().await;
    assert_eq!(devices[0].hostport, "p2");
}

#[tokio::test]
async fn failed_attach_does_not_mutate() {
    let pool = PoolHarness::new("a,p1").await;

    assert_eq!(pool.attach("a", "p2").await, 400);
    assert_eq!(pool.list().await[0].hostport, "p1");
}

#[tokio::test]
async fn detach_is_idempotent_over_http() {
    let pool = PoolHarness::new("a,").await;

    assert_eq!(pool.detach("a").await, 204);
    assert_eq!(pool.detach("a").await, 204);
    assert_eq!(pool.list().await[0].hostport, "");
}

#[tokio::test]
async fn unknown_device_is_404() {
    let pool = PoolHarness::new("a,p1").await;

    assert_eq!(pool.attach("gpu9", "p2").await, 404);
    assert_eq!(pool.detach("gpu9").await, 404);
}

#[tokio::test]
async fn empty_hostport_is_400() {
    let pool = PoolHarness::new("a,").await;

    assert_eq!(pool.attach("a", "").await, 400);
}

#[tokio::test]
async fn uuids_survive_attach_detach_cycles() {
    let pool = PoolHarness::new("a,\nb,p1").await;

    let before: Vec<_> = pool.list().await.into_iter().map(|d| d.uuid).collect();

    for port in ["p1", "p2", "p3"] {
        assert_eq!(pool.detach("a").await, 204);
        assert_eq!(pool.attach("a", port).await, 204);
    }

    let after: Vec<_> = pool.list().await.into_iter().map(|d| d.uuid).collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn rebinding_lands_on_final_port() {
    let pool = PoolHarness::new("a,").await;

    assert_eq!(pool.attach("a", "p1").await, 204);
    assert_eq!(pool.detach("a").await, 204);
    assert_eq!(pool.attach("a", "p2").await, 204);

    assert_eq!(pool.list().await[0].hostport, "p2");
}

#[tokio::test]
async fn malformed_body_is_400() {
    let pool = PoolHarness::new("a,").await;

    let status = pool
        .client
        .post(format!("{}/allocation", pool.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, 400);
}
