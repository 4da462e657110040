//! Replication planner.
//!
//! Runs with the directory write lock held (it mutates `current` optimistically)
//! but never performs I/O itself — it hands back the bus messages and audit
//! lines for the caller to act on after the lock is released, so nothing
//! blocks while the lock is held.

use super::state::Directory;
use crate::bus::ReplicationMessage;
use crate::config::CommonConfig;

pub struct PlannedReplication {
    pub message: ReplicationMessage,
    pub audit_line: String,
}

/// Plans replication for one under-replicated (filename, chunk_index).
///
/// `current[0]` (the earliest known holder) is always the chosen source —
/// a simple, deterministic pick. Optimistic append means a replica is
/// recorded here before the target has actually materialized it (a known
/// weakness: a subsequent planner run can't distinguish an in-flight
/// replication from a completed one).
pub fn plan_for_chunk(
    dir: &mut Directory,
    common: &CommonConfig,
    filename: &str,
    chunk_index: u64,
) -> Vec<PlannedReplication> {
    let active = dir.active_node_urls(super::state::liveness_timeout(common));

    let Some(entry) = dir.files.get_mut(filename) else {
        return Vec::new();
    };
    let Some(current) = entry.chunks.get_mut(&chunk_index) else {
        return Vec::new();
    };

    if current.is_empty() {
        return Vec::new();
    }

    let candidates: Vec<String> = active
        .into_iter()
        .filter(|url| !current.contains(url))
        .collect();

    let needed = common.replication_factor.saturating_sub(current.len());
    if needed == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let source = current[0].clone();
    let mut planned = Vec::new();
    for target in candidates.into_iter().take(needed) {
        current.push(target.clone());
        planned.push(PlannedReplication {
            audit_line: format!(
                "{} - Chunk {} replicated to {}",
                filename, chunk_index, target
            ),
            message: ReplicationMessage::Replicate {
                filename: filename.to_string(),
                chunk_index,
                source_node_url: source.clone(),
                target_node_url: target,
            },
        });
    }
    planned
}
