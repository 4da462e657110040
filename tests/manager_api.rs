//! End-to-end exercise of the manager's HTTP API against a real
//! in-process `axum::serve` instance bound to an ephemeral port.

use std::collections::BTreeMap;

use chunkfs::bus::ManagerMessage;
use chunkfs::config::CommonConfig;
use chunkfs::manager::api;
use chunkfs::manager::ManagerService;

async fn spawn_manager(common: CommonConfig) -> (String, tokio::task::JoinHandle<()>) {
    let dir = tempfile::tempdir().unwrap();
    let manager = ManagerService::new(common, dir.path().join("audit.log").to_str().unwrap().to_string());
    let app = api::router(manager);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), handle)
}

#[tokio::test]
async fn upload_request_returns_service_unavailable_with_no_nodes() {
    let (base_url, _server) = spawn_manager(CommonConfig::default()).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{}/upload_request", base_url))
        .json(&serde_json::json!({ "filename": "f.bin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn full_lifecycle_register_list_remove() {
    let (base_url, _server) = spawn_manager(CommonConfig::default()).await;
    let http = reqwest::Client::new();

    http.post(format!("{}/bus/manager", base_url))
        .json(&ManagerMessage::Heartbeat {
            node_id: "n1".into(),
            node_url: "http://127.0.0.1:9001".into(),
        })
        .send()
        .await
        .unwrap();

    let resp = http
        .post(format!("{}/upload_request", base_url))
        .json(&serde_json::json!({ "filename": "f.bin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["node_urls"][0], "http://127.0.0.1:9001");

    http.post(format!("{}/bus/manager", base_url))
        .json(&ManagerMessage::RegisterFile {
            filename: "f.bin".into(),
            chunk_index: 0,
            node_url: "http://127.0.0.1:9001".into(),
            total_chunks: Some(1),
        })
        .send()
        .await
        .unwrap();

    let resp = http
        .get(format!("{}/download_location/f.bin", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let locations: BTreeMap<u64, String> = resp.json().await.unwrap();
    assert_eq!(locations[&0], "http://127.0.0.1:9001");

    let resp = http.get(format!("{}/list", base_url)).send().await.unwrap();
    let snapshot: chunkfs::manager::DirectorySnapshot = resp.json().await.unwrap();
    assert!(snapshot.contains_key("f.bin"));

    let resp = http
        .delete(format!("{}/remove/f.bin", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let resp = http
        .get(format!("{}/download_location/f.bin", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_location_for_unknown_file_is_not_found() {
    let (base_url, _server) = spawn_manager(CommonConfig::default()).await;
    let http = reqwest::Client::new();

    let resp = http
        .get(format!("{}/download_location/nope.bin", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}
