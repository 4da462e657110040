//! Manager registry and directory state.
//!
//! Both maps live behind their own `RwLock`, following the teacher's
//! `MasterService` (`Arc<RwLock<HashMap<..>>>` per domain concept, mutated
//! under lock, read as a snapshot for serving requests).

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use crate::config::CommonConfig;

/// A node's registry entry. Created on first heartbeat, updated on every
/// later one, never deleted.
#[derive(Clone, Debug)]
pub struct NodeRecord {
    pub node_url: String,
    pub last_heartbeat: Instant,
}

/// A filename's directory entry: chunk index -> ordered, de-duplicated
/// replica set, plus the total chunk count learned on first registration.
#[derive(Clone, Debug, Default)]
pub struct FileEntry {
    pub total_chunks: Option<u64>,
    pub chunks: BTreeMap<u64, Vec<String>>,
}

#[derive(Default)]
pub struct Directory {
    pub nodes: HashMap<String, NodeRecord>,
    pub files: HashMap<String, FileEntry>,
}

impl Directory {
    /// Node urls whose last heartbeat is within `liveness_timeout` of now.
    pub fn active_node_urls(&self, liveness_timeout: Duration) -> Vec<String> {
        let now = Instant::now();
        self.nodes
            .values()
            .filter(|r| now.duration_since(r.last_heartbeat) < liveness_timeout)
            .map(|r| r.node_url.clone())
            .collect()
    }

    pub fn is_node_url_active(&self, node_url: &str, liveness_timeout: Duration) -> bool {
        let now = Instant::now();
        self.nodes.values().any(|r| {
            r.node_url == node_url && now.duration_since(r.last_heartbeat) < liveness_timeout
        })
    }

    pub fn upsert_heartbeat(&mut self, node_id: String, node_url: String) {
        self.nodes.insert(
            node_id,
            NodeRecord {
                node_url,
                last_heartbeat: Instant::now(),
            },
        );
    }

    /// Appends `node_url` to the chunk's replica set iff not already
    /// present. Returns true if the set was modified.
    pub fn register_chunk(
        &mut self,
        filename: &str,
        chunk_index: u64,
        node_url: &str,
        total_chunks: Option<u64>,
    ) -> bool {
        let entry = self.files.entry(filename.to_string()).or_default();
        if entry.total_chunks.is_none() {
            entry.total_chunks = total_chunks;
        }
        let replicas = entry.chunks.entry(chunk_index).or_default();
        if replicas.iter().any(|u| u == node_url) {
            false
        } else {
            replicas.push(node_url.to_string());
            true
        }
    }

    pub fn register_empty_file(&mut self, filename: &str) {
        self.files
            .entry(filename.to_string())
            .or_insert_with(|| FileEntry {
                total_chunks: Some(0),
                chunks: BTreeMap::new(),
            });
    }
}

pub fn liveness_timeout(common: &CommonConfig) -> Duration {
    Duration::from_secs(common.liveness_timeout_secs)
}

pub fn prune_grace(common: &CommonConfig) -> Duration {
    Duration::from_secs(common.liveness_timeout_secs * common.prune_grace_multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_chunk_is_append_if_absent_and_idempotent() {
        let mut dir = Directory::default();
        assert!(dir.register_chunk("f", 0, "http://n1", Some(3)));
        assert!(!dir.register_chunk("f", 0, "http://n1", Some(3)));
        assert!(dir.register_chunk("f", 0, "http://n2", Some(3)));
        let replicas = &dir.files["f"].chunks[&0];
        assert_eq!(replicas, &vec!["http://n1".to_string(), "http://n2".to_string()]);
        assert_eq!(dir.files["f"].total_chunks, Some(3));
    }

    #[test]
    fn total_chunks_is_fixed_on_first_registration() {
        let mut dir = Directory::default();
        dir.register_chunk("f", 0, "http://n1", Some(3));
        dir.register_chunk("f", 1, "http://n1", Some(99));
        assert_eq!(dir.files["f"].total_chunks, Some(3));
    }

    #[test]
    fn empty_file_is_representable() {
        let mut dir = Directory::default();
        dir.register_empty_file("empty.bin");
        let entry = &dir.files["empty.bin"];
        assert_eq!(entry.total_chunks, Some(0));
        assert!(entry.chunks.is_empty());
    }
}
