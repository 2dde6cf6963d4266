#![allow(clippy::unwrap_used)]
// Integration tests for the synchronization actions against a wiremock backend.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use devdash_core::{
    CoreError, Dashboard, DashboardConfig, Device, DeviceId, NewDevice, SyncStatus,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Dashboard) {
    let server = MockServer::start().await;
    let config = DashboardConfig::new(server.uri().parse().unwrap());
    let dashboard = Dashboard::new(config).unwrap();
    (server, dashboard)
}

fn ids(devices: &[std::sync::Arc<Device>]) -> Vec<&str> {
    devices.iter().map(|d| d.id.as_str()).collect()
}

async fn mount_list(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn error_of(dashboard: &Dashboard) -> Option<String> {
    dashboard.sync_status().error
}

// ── fetch_all ───────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_all_partitions_by_connectivity() {
    let (server, dashboard) = setup().await;
    mount_list(
        &server,
        json!([
            { "id": "a", "connected": true },
            { "id": "b", "connected": false }
        ]),
    )
    .await;

    tokio_test::assert_ok!(dashboard.fetch_all().await);

    let query = dashboard.query();
    assert_eq!(ids(&query.online()), vec!["a"]);
    assert_eq!(ids(&query.offline()), vec!["b"]);
    assert_eq!(dashboard.sync_status(), SyncStatus::default());
}

#[tokio::test]
async fn fetch_all_twice_is_idempotent() {
    let (server, dashboard) = setup().await;
    mount_list(
        &server,
        json!([
            { "id": "a", "connected": true, "name": "Boiler", "last_data": { "t": 61 } },
            { "id": "b", "connected": false, "type": "contact" }
        ]),
    )
    .await;

    dashboard.fetch_all().await.unwrap();
    let once = dashboard.query().to_vec();
    dashboard.fetch_all().await.unwrap();
    let twice = dashboard.query().to_vec();

    assert_eq!(once, twice);
}

#[tokio::test]
async fn fetch_all_tolerates_non_string_text_fields() {
    let (server, dashboard) = setup().await;
    mount_list(
        &server,
        json!([
            { "id": "a", "connected": true, "status": 3, "last_seen": 1_700_000_000 },
            { "id": "b", "connected": false, "name": null, "type": ["camera"] }
        ]),
    )
    .await;

    tokio_test::assert_ok!(dashboard.fetch_all().await);

    let query = dashboard.query();
    assert_eq!(query.len(), 2);
    let a = query.by_id("a").unwrap();
    assert_eq!(a.status, devdash_core::DeviceStatus::Unknown);
    assert_eq!(a.last_seen, None);
    let b = query.by_id("b").unwrap();
    assert_eq!(b.label(), "b");
    assert_eq!(b.device_type, None);
}

#[tokio::test]
async fn fetch_all_failure_keeps_previous_collection() {
    let (server, dashboard) = setup().await;
    dashboard
        .repository()
        .replace_all([Device::new("stale", true)]);

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = dashboard.fetch_all().await.unwrap_err();
    assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    assert_eq!(error_of(&dashboard).as_deref(), Some("Failed to fetch devices"));
    assert!(!dashboard.sync_status().loading);
    assert!(dashboard.query().by_id("stale").is_some());
}

#[tokio::test]
async fn unreachable_backend_uses_the_same_message() {
    let config = DashboardConfig::new("http://127.0.0.1:1".parse().unwrap());
    let dashboard = Dashboard::new(config).unwrap();

    let err = dashboard.fetch_all().await.unwrap_err();
    assert!(matches!(err, CoreError::ConnectionFailed { .. }), "got {err:?}");
    assert_eq!(error_of(&dashboard).as_deref(), Some("Failed to fetch devices"));
}

// ── fetch_one ───────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_one_sets_selected() {
    let (server, dashboard) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/devices/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "a", "connected": true, "status": "online"
        })))
        .mount(&server)
        .await;

    dashboard.fetch_one(&DeviceId::new("a")).await.unwrap();

    let selected = dashboard.selected().unwrap();
    assert_eq!(selected.id.as_str(), "a");
    // selection does not populate the collection
    assert!(dashboard.query().is_empty());
}

#[tokio::test]
async fn fetch_one_not_found_keeps_previous_selection() {
    let (server, dashboard) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/devices/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "a" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/x"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Device not found"))
        .mount(&server)
        .await;

    dashboard.fetch_one(&DeviceId::new("a")).await.unwrap();
    let err = dashboard.fetch_one(&DeviceId::new("x")).await.unwrap_err();

    assert!(
        matches!(err, CoreError::DeviceNotFound { ref identifier } if identifier == "x"),
        "got {err:?}"
    );
    let status = dashboard.sync_status();
    assert_eq!(status.error.as_deref(), Some("Failed to fetch device details"));
    assert!(!status.loading);
    assert_eq!(dashboard.selected().unwrap().id.as_str(), "a");
}

// ── register / unregister ───────────────────────────────────────────

#[tokio::test]
async fn register_reconciles_from_backend_list() {
    let (server, dashboard) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/devices"))
        .and(body_json(json!({ "id": "d1", "name": "Door", "type": "contact" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "d1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "a", "connected": true },
            { "id": "d1", "connected": false, "name": "Door", "type": "contact" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    dashboard
        .register(NewDevice {
            id: DeviceId::new("d1"),
            name: "Door".into(),
            device_type: "contact".into(),
        })
        .await
        .unwrap();

    let query = dashboard.query();
    let all: Vec<&str> = query.ids().map(DeviceId::as_str).collect();
    assert_eq!(all, vec!["a", "d1"]);
    assert_eq!(query.by_id("d1").unwrap().name.as_deref(), Some("Door"));
    assert!(!dashboard.sync_status().loading);
}

#[tokio::test]
async fn register_never_inserts_optimistically() {
    let (server, dashboard) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    // registry has not caught up yet
    mount_list(&server, json!([{ "id": "a", "connected": true }])).await;

    dashboard
        .register(NewDevice {
            id: DeviceId::new("late"),
            name: "Late".into(),
            device_type: "sensor".into(),
        })
        .await
        .unwrap();

    assert!(dashboard.query().by_id("late").is_none());
    assert_eq!(dashboard.query().len(), 1);
}

#[tokio::test]
async fn register_rejection_skips_reconcile() {
    let (server, dashboard) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(400).set_body_string("ID, name, and type are required"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let err = dashboard
        .register(NewDevice {
            id: DeviceId::new(""),
            name: String::new(),
            device_type: String::new(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Api { status: Some(400), .. }));
    assert_eq!(error_of(&dashboard).as_deref(), Some("Failed to register device"));
    assert!(!dashboard.sync_status().loading);
}

#[tokio::test]
async fn unregister_reconciles_from_backend_list() {
    let (server, dashboard) = setup().await;
    dashboard
        .repository()
        .replace_all([Device::new("a", true), Device::new("gone", true)]);

    Mock::given(method("DELETE"))
        .and(path("/api/devices/gone"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    mount_list(&server, json!([{ "id": "a", "connected": true }])).await;

    dashboard.unregister(&DeviceId::new("gone")).await.unwrap();

    assert!(dashboard.query().by_id("gone").is_none());
    assert_eq!(dashboard.query().len(), 1);
}

#[tokio::test]
async fn unregister_failure_sets_message() {
    let (server, dashboard) = setup().await;
    Mock::given(method("DELETE"))
        .and(path("/api/devices/a"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(dashboard.unregister(&DeviceId::new("a")).await.is_err());
    assert_eq!(error_of(&dashboard).as_deref(), Some("Failed to unregister device"));
}

// ── push_data ───────────────────────────────────────────────────────

#[tokio::test]
async fn push_data_does_not_touch_loading() {
    let (server, dashboard) = setup().await;
    let payload = json!({ "temperature": 22.5 });
    Mock::given(method("POST"))
        .and(path("/api/devices/s1/data"))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut status = dashboard.repository().watch_sync_status();
    dashboard
        .push_data(&DeviceId::new("s1"), &payload)
        .await
        .unwrap();

    assert!(!status.has_changed().unwrap());
}

#[tokio::test]
async fn push_data_failure_sets_message() {
    let (server, dashboard) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/devices/s1/data"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(dashboard.push_data(&DeviceId::new("s1"), &json!({})).await.is_err());
    assert_eq!(error_of(&dashboard).as_deref(), Some("Failed to update device data"));
    assert!(!dashboard.sync_status().loading);
}

// ── Shared status slot ──────────────────────────────────────────────

#[tokio::test]
async fn error_is_last_writer_wins_and_cleared_by_any_success() {
    let (server, dashboard) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/devices/s1/data"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "a" })))
        .mount(&server)
        .await;

    let _ = dashboard.fetch_all().await;
    let _ = dashboard.push_data(&DeviceId::new("s1"), &json!({})).await;
    assert_eq!(error_of(&dashboard).as_deref(), Some("Failed to update device data"));

    // a different kind of operation clears it
    dashboard.fetch_one(&DeviceId::new("a")).await.unwrap();
    assert!(error_of(&dashboard).is_none());
}

#[tokio::test]
async fn overlapping_actions_clear_loading_early() {
    let (server, dashboard) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "id": "a", "connected": true }]))
                .set_delay(Duration::from_secs(1)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "a" })))
        .mount(&server)
        .await;

    let mut status = dashboard.repository().watch_sync_status();
    let slow = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.fetch_all().await }
    });
    status.wait_for(|s| s.loading).await.unwrap();

    dashboard.fetch_one(&DeviceId::new("a")).await.unwrap();

    // loading is a flag: the fast action cleared it while fetch_all runs on
    assert!(!dashboard.sync_status().loading);
    assert!(!slow.is_finished());

    slow.await.unwrap().unwrap();
    assert!(!dashboard.sync_status().loading);
    assert_eq!(dashboard.query().len(), 1);
}

#[tokio::test]
async fn cancelled_action_still_clears_loading() {
    let (server, dashboard) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let result = tokio::time::timeout(Duration::from_millis(100), dashboard.fetch_all()).await;

    assert!(result.is_err());
    assert!(!dashboard.sync_status().loading);
}
