//! End-to-end upload/download through a real manager + node pair, both
//! served in-process on ephemeral ports: a 300-byte file at ChunkSize=128
//! splits into 3 chunks and reassembles exactly.

use std::sync::Arc;

use chunkfs::client::Client;
use chunkfs::config::CommonConfig;
use chunkfs::manager::{api as manager_api, ManagerService};
use chunkfs::node::{api as node_api, NodeService};

async fn spawn_manager(common: CommonConfig) -> String {
    let dir = tempfile::tempdir().unwrap();
    let manager = ManagerService::new(common, dir.path().join("audit.log").to_str().unwrap().to_string());
    let app = manager_api::router(manager);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_node(manager_url: &str, common: CommonConfig) -> String {
    let storage = tempfile::tempdir().unwrap();
    // Keep the tempdir alive for the process lifetime of the test binary.
    let storage_path = storage.path().to_path_buf();
    std::mem::forget(storage);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let advertise_url = format!("http://{}", addr);

    let node = Arc::new(NodeService::new(
        advertise_url.clone(),
        advertise_url.clone(),
        storage_path,
        manager_url.to_string(),
        common,
    ));
    node.clone()
        .spawn_heartbeat(tokio_util::sync::CancellationToken::new());

    let app = node_api::router(node);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    advertise_url
}

#[tokio::test]
async fn upload_then_download_round_trips_exact_bytes() {
    let mut common = CommonConfig::default();
    common.chunk_size = 128;
    common.replication_factor = 1;
    common.heartbeat_interval_secs = 1;
    common.liveness_timeout_secs = 30;

    let manager_url = spawn_manager(common.clone()).await;
    let _node_url = spawn_node(&manager_url, common.clone()).await;

    // Give the node's first heartbeat a moment to land.
    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    let src_dir = tempfile::tempdir().unwrap();
    let src_path = src_dir.path().join("sample.bin");
    let contents: Vec<u8> = (0..300u32).map(|b| (b % 256) as u8).collect();
    tokio::fs::write(&src_path, &contents).await.unwrap();

    let client = Client::new(manager_url.clone(), common.clone());
    let summary = client.upload(&src_path).await.unwrap();
    assert_eq!(summary.total_chunks, 3);
    assert!(summary.failed_chunks.is_empty());

    let dest_path = src_dir.path().join("downloaded.bin");
    client.download("sample.bin", &dest_path).await.unwrap();

    let downloaded = tokio::fs::read(&dest_path).await.unwrap();
    assert_eq!(downloaded, contents);
}

#[tokio::test]
async fn zero_byte_file_uploads_with_no_chunks_and_is_listed() {
    let common = CommonConfig::default();
    let manager_url = spawn_manager(common.clone()).await;

    let src_dir = tempfile::tempdir().unwrap();
    let src_path = src_dir.path().join("empty.bin");
    tokio::fs::write(&src_path, b"").await.unwrap();

    let client = Client::new(manager_url.clone(), common.clone());
    let summary = client.upload(&src_path).await.unwrap();
    assert_eq!(summary.total_chunks, 0);

    let directory = client.list().await.unwrap();
    assert!(directory.contains_key("empty.bin"));
}
