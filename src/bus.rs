//! Control-message bus between manager and nodes.
//!
//! The wire messages are JSON-tagged enums. Transport is point-to-point
//! HTTP between processes using one pooled `reqwest::Client` per process,
//! rather than opening a fresh connection per request. Routing a
//! replication order directly at its `target_node_url` — rather than
//! broadcasting on a shared queue — also means only the designated node
//! ever acts on it, with no competitive-consumer race to filter client-side.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Messages carried on the logical `manager_queue`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManagerMessage {
    Heartbeat {
        node_id: String,
        node_url: String,
    },
    RegisterFile {
        filename: String,
        chunk_index: u64,
        node_url: String,
        /// Present when the publisher knows the file's total chunk count
        /// (every client-driven upload does); used to populate
        /// `FileEntry::total_chunks` on first sight.
        #[serde(default)]
        total_chunks: Option<u64>,
    },
    /// Registers a zero-byte file, which produces no chunks and would
    /// otherwise be unrepresentable.
    RegisterEmptyFile {
        filename: String,
    },
}

/// Messages carried on the logical `replication_queue`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplicationMessage {
    Replicate {
        filename: String,
        chunk_index: u64,
        source_node_url: String,
        target_node_url: String,
    },
}

/// A pooled client nodes use to publish onto `manager_queue`.
#[derive(Clone)]
pub struct ManagerBusClient {
    http: reqwest::Client,
    manager_url: String,
}

impl ManagerBusClient {
    pub fn new(manager_url: impl Into<String>, request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client builds with a static config");
        Self {
            http,
            manager_url: manager_url.into(),
        }
    }

    pub async fn publish(&self, message: &ManagerMessage) -> Result<(), reqwest::Error> {
        self.http
            .post(format!("{}/bus/manager", self.manager_url))
            .json(message)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// A pooled client the manager uses to publish onto `replication_queue`,
/// addressed directly at the designated target node.
#[derive(Clone)]
pub struct ReplicationBusClient {
    http: reqwest::Client,
}

impl ReplicationBusClient {
    pub fn new(request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client builds with a static config");
        Self { http }
    }

    pub async fn publish(
        &self,
        target_node_url: &str,
        message: &ReplicationMessage,
    ) -> Result<(), reqwest::Error> {
        self.http
            .post(format!("{}/bus/replicate", target_node_url))
            .json(message)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
