pub mod api;
pub mod audit;
pub mod planner;
pub mod state;
pub mod sweep;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::bus::{ManagerMessage, ReplicationBusClient};
use crate::config::CommonConfig;
use crate::error::ManagerError;
use audit::AuditLog;
use state::{liveness_timeout, Directory};

/// Snapshot of the directory returned by `list()`.
pub type DirectorySnapshot = std::collections::HashMap<String, std::collections::BTreeMap<u64, Vec<String>>>;

/// Central metadata authority: node registry + file directory, guarded by
/// one logical lock, following the teacher's `MasterService` shape
/// (`Arc<RwLock<..>>` per concept, a background sweeper, and a pooled
/// outbound client).
pub struct ManagerService {
    directory: RwLock<Directory>,
    common: CommonConfig,
    audit: AuditLog,
    replication_bus: ReplicationBusClient,
}

impl ManagerService {
    pub fn new(common: CommonConfig, audit_log_path: impl Into<String>) -> Arc<Self> {
        let request_timeout = Duration::from_secs(common.request_timeout_secs);
        Arc::new(Self {
            directory: RwLock::new(Directory::default()),
            common,
            audit: AuditLog::new(audit_log_path),
            replication_bus: ReplicationBusClient::new(request_timeout),
        })
    }

    pub fn common(&self) -> &CommonConfig {
        &self.common
    }

    /// Dispatches one control message. Idempotent: heartbeats upsert, and
    /// `register_file` is append-if-absent.
    pub async fn handle_message(self: &Arc<Self>, message: ManagerMessage) {
        match message {
            ManagerMessage::Heartbeat { node_id, node_url } => {
                let mut dir = self.directory.write().await;
                dir.upsert_heartbeat(node_id, node_url);
            }
            ManagerMessage::RegisterFile {
                filename,
                chunk_index,
                node_url,
                total_chunks,
            } => {
                let (registered, planned) = {
                    let mut dir = self.directory.write().await;
                    let registered =
                        dir.register_chunk(&filename, chunk_index, &node_url, total_chunks);
                    let under_replicated = dir
                        .files
                        .get(&filename)
                        .and_then(|e| e.chunks.get(&chunk_index))
                        .map(|replicas| replicas.len() < self.common.replication_factor)
                        .unwrap_or(false);
                    let planned = if under_replicated {
                        planner::plan_for_chunk(&mut dir, &self.common, &filename, chunk_index)
                    } else {
                        Vec::new()
                    };
                    (registered, planned)
                };
                if registered {
                    self.audit
                        .record(
                            "REGISTER",
                            &format!(
                                "{} - Chunk {} registered on {}",
                                filename, chunk_index, node_url
                            ),
                        )
                        .await;
                }
                self.dispatch_planned(planned).await;
            }
            ManagerMessage::RegisterEmptyFile { filename } => {
                let mut dir = self.directory.write().await;
                dir.register_empty_file(&filename);
            }
        }
    }

    async fn dispatch_planned(&self, planned: Vec<planner::PlannedReplication>) {
        for p in planned {
            self.audit.record("REPLICATE", &p.audit_line).await;
            let target = match &p.message {
                crate::bus::ReplicationMessage::Replicate {
                    target_node_url, ..
                } => target_node_url.clone(),
            };
            if let Err(e) = self.replication_bus.publish(&target, &p.message).await {
                tracing::warn!("failed to publish replication order to {}: {}", target, e);
            }
        }
    }

    /// Returns the currently active nodes, or `NoNodesAvailable` if none.
    pub async fn upload_request(&self) -> Result<Vec<String>, ManagerError> {
        let dir = self.directory.read().await;
        let active = dir.active_node_urls(liveness_timeout(&self.common));
        if active.is_empty() {
            Err(ManagerError::NoNodesAvailable)
        } else {
            Ok(active)
        }
    }

    /// Returns one active holder per chunk index, or `NotFound`.
    pub async fn download_location(
        &self,
        filename: &str,
    ) -> Result<std::collections::BTreeMap<u64, String>, ManagerError> {
        let dir = self.directory.read().await;
        let entry = dir
            .files
            .get(filename)
            .ok_or_else(|| ManagerError::NotFound(filename.to_string()))?;

        let mut response = std::collections::BTreeMap::new();
        for (&chunk_index, replicas) in &entry.chunks {
            if let Some(active_replica) = replicas
                .iter()
                .find(|url| dir.is_node_url_active(url, liveness_timeout(&self.common)))
            {
                response.insert(chunk_index, active_replica.clone());
            }
        }
        if response.is_empty() {
            Err(ManagerError::NotFound(filename.to_string()))
        } else {
            Ok(response)
        }
    }

    /// Full directory snapshot.
    pub async fn list(&self) -> DirectorySnapshot {
        let dir = self.directory.read().await;
        dir.files
            .iter()
            .map(|(name, entry)| (name.clone(), entry.chunks.clone()))
            .collect()
    }

    /// Best-effort delete RPC per known replica, then drop the directory
    /// entry.
    pub async fn remove(
        self: &Arc<Self>,
        http: &reqwest::Client,
        filename: &str,
    ) -> Result<(), ManagerError> {
        let entry = {
            let mut dir = self.directory.write().await;
            dir.files
                .remove(filename)
                .ok_or_else(|| ManagerError::NotFound(filename.to_string()))?
        };

        for (chunk_index, replicas) in entry.chunks {
            let chunk_filename = format!("{}.chunk{}", filename, chunk_index);
            for node_url in replicas {
                let url = format!("{}/delete/{}", node_url, chunk_filename);
                if let Err(e) = http.delete(&url).send().await {
                    tracing::warn!("failed to remove {} from {}: {}", chunk_filename, node_url, e);
                }
            }
        }

        self.audit
            .record("REMOVE", &format!("{} removed from the system", filename))
            .await;
        Ok(())
    }

    /// One liveness/re-replication sweep pass. Exposed for the background
    /// task in `sweep` and for direct invocation from tests.
    pub async fn run_sweep_once(self: &Arc<Self>) {
        sweep::run_once(self).await;
    }
}
