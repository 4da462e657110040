//! Storage node core: heartbeat publisher, upload/download/delete,
//! replication consumer.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::storage;
use crate::bus::{ManagerBusClient, ManagerMessage};
use crate::chunk::ChunkHeader;
use crate::config::CommonConfig;
use crate::error::NodeError;

pub struct NodeService {
    pub node_id: String,
    pub advertise_url: String,
    pub storage_dir: PathBuf,
    pub manager_bus: ManagerBusClient,
    pub http: reqwest::Client,
    pub common: CommonConfig,
}

impl NodeService {
    pub fn new(
        node_id: impl Into<String>,
        advertise_url: impl Into<String>,
        storage_dir: impl Into<PathBuf>,
        manager_url: impl Into<String>,
        common: CommonConfig,
    ) -> Self {
        let request_timeout = Duration::from_secs(common.request_timeout_secs);
        Self {
            node_id: node_id.into(),
            advertise_url: advertise_url.into(),
            storage_dir: storage_dir.into(),
            manager_bus: ManagerBusClient::new(manager_url, request_timeout),
            http: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .expect("reqwest client builds with a static config"),
            common,
        }
    }

    /// Writes an uploaded chunk to disk and publishes `register_file` on
    /// the manager bus. `payload` is the full wire frame (header line +
    /// body) as received, stored verbatim.
    pub async fn upload(
        &self,
        filename: &str,
        chunk_index: u64,
        payload: &[u8],
    ) -> Result<(), NodeError> {
        let chunk_filename = storage::chunk_filename(filename, chunk_index);
        storage::write_chunk_atomic(&self.storage_dir, &chunk_filename, payload).await?;

        let total_chunks = ChunkHeader::parse(payload).ok().map(|(h, _)| h.total_chunks);
        self.register_with_manager(filename, chunk_index, total_chunks)
            .await;
        Ok(())
    }

    pub async fn download(&self, chunk_filename: &str) -> Result<Vec<u8>, NodeError> {
        storage::read_chunk(&self.storage_dir, chunk_filename)
            .await?
            .ok_or_else(|| NodeError::NotFound(chunk_filename.to_string()))
    }

    /// Idempotent: returns whether a file was actually removed.
    pub async fn delete(&self, chunk_filename: &str) -> Result<bool, NodeError> {
        Ok(storage::delete_chunk(&self.storage_dir, chunk_filename).await?)
    }

    /// Pulls `<filename>.chunk<index>` from `source_node_url` and persists
    /// it locally, then registers the new replica.
    pub async fn replicate(
        &self,
        filename: &str,
        chunk_index: u64,
        source_node_url: &str,
    ) -> Result<(), NodeError> {
        let chunk_filename = storage::chunk_filename(filename, chunk_index);
        let url = format!("{}/download/{}", source_node_url, chunk_filename);
        let body = self.http.get(&url).send().await?.bytes().await?;

        storage::write_chunk_atomic(&self.storage_dir, &chunk_filename, &body).await?;

        let total_chunks = ChunkHeader::parse(&body).ok().map(|(h, _)| h.total_chunks);
        self.register_with_manager(filename, chunk_index, total_chunks)
            .await;
        Ok(())
    }

    async fn register_with_manager(&self, filename: &str, chunk_index: u64, total_chunks: Option<u64>) {
        let message = ManagerMessage::RegisterFile {
            filename: filename.to_string(),
            chunk_index,
            node_url: self.advertise_url.clone(),
            total_chunks,
        };
        if let Err(e) = self.manager_bus.publish(&message).await {
            tracing::warn!("failed to register chunk {} of {} with manager: {}", chunk_index, filename, e);
        }
    }

    /// Periodic heartbeat publisher. Must satisfy
    /// `HeartbeatInterval < LivenessTimeout / 2`.
    pub fn spawn_heartbeat(
        self: std::sync::Arc<Self>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let interval = Duration::from_secs(self.common.heartbeat_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("heartbeat task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let message = ManagerMessage::Heartbeat {
                            node_id: self.node_id.clone(),
                            node_url: self.advertise_url.clone(),
                        };
                        if let Err(e) = self.manager_bus.publish(&message).await {
                            tracing::warn!("failed to send heartbeat: {}", e);
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(dir: &std::path::Path) -> NodeService {
        NodeService::new(
            "n1",
            "http://127.0.0.1:1",
            dir.to_path_buf(),
            "http://127.0.0.1:2",
            CommonConfig::default(),
        )
    }

    #[tokio::test]
    async fn upload_then_download_round_trips_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let node = service(dir.path());
        let header = ChunkHeader::new(0, "f.bin", 1, crate::chunk::md5_hex(b"abc"));
        let payload = header.frame(b"abc");
        // register_with_manager will fail to reach a real manager; that's
        // fine, upload() only warns on bus failure.
        node.upload("f.bin", 0, &payload).await.unwrap();
        let downloaded = node.download("f.bin.chunk0").await.unwrap();
        assert_eq!(downloaded, payload);
    }

    #[tokio::test]
    async fn delete_missing_chunk_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let node = service(dir.path());
        assert!(!node.delete("nope.chunk0").await.unwrap());
    }
}
