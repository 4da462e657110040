//! Background liveness / re-replication sweep, plus stale-replica pruning
//! once a node has been inactive past its grace period.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::planner;
use super::state::{liveness_timeout, prune_grace};
use super::ManagerService;

/// Runs every `SweepInterval` until `shutdown` is cancelled, so the task can
/// be stopped cleanly on shutdown instead of being abandoned.
pub fn spawn(manager: Arc<ManagerService>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_secs(manager.common().sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("sweep task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    run_once(&manager).await;
                }
            }
        }
    })
}

/// One sweep pass, exposed standalone so tests can drive it without
/// waiting on the timer.
pub async fn run_once(manager: &Arc<ManagerService>) {
    let common = manager.common().clone();
    let liveness = liveness_timeout(&common);
    let grace = prune_grace(&common);
    let now = Instant::now();

    // Phase 1: under lock, find failing/stale replicas, prune the stale
    // ones, and optimistically plan replication for chunks that are now
    // under-replicated. No I/O happens while the lock is held.
    struct Trigger {
        filename: String,
        chunk_index: u64,
    }
    let mut failures = Vec::new();
    let mut triggers: Vec<Trigger> = Vec::new();

    {
        let mut dir = manager.directory.write().await;

        let heartbeat_age = |node_url: &str| -> Option<Duration> {
            dir.nodes
                .values()
                .find(|r| r.node_url == node_url)
                .map(|r| now.duration_since(r.last_heartbeat))
        };

        // Collect (filename, chunk_index, inactive replica, should_prune)
        let mut inactive_refs: Vec<(String, u64, String, bool)> = Vec::new();
        for (filename, entry) in dir.files.iter() {
            for (&chunk_index, replicas) in entry.chunks.iter() {
                for node_url in replicas {
                    let age = heartbeat_age(node_url);
                    let is_active = age.map(|a| a < liveness).unwrap_or(false);
                    if !is_active {
                        let should_prune = age.map(|a| a >= grace).unwrap_or(true);
                        inactive_refs.push((
                            filename.clone(),
                            chunk_index,
                            node_url.clone(),
                            should_prune,
                        ));
                    }
                }
            }
        }

        for (filename, chunk_index, node_url, should_prune) in inactive_refs {
            failures.push(format!(
                "{} failed. Checking re-sync need for {} - Chunk {}.",
                node_url, filename, chunk_index
            ));
            if should_prune {
                if let Some(entry) = dir.files.get_mut(&filename) {
                    if let Some(replicas) = entry.chunks.get_mut(&chunk_index) {
                        replicas.retain(|u| u != &node_url);
                    }
                }
            }
            triggers.push(Trigger {
                filename,
                chunk_index,
            });
        }

        // De-dup triggers (multiple failed replicas on the same chunk
        // should only plan once).
        triggers.sort_by(|a, b| (a.filename.clone(), a.chunk_index).cmp(&(b.filename.clone(), b.chunk_index)));
        triggers.dedup_by(|a, b| a.filename == b.filename && a.chunk_index == b.chunk_index);

        let mut planned = Vec::new();
        for t in &triggers {
            planned.extend(planner::plan_for_chunk(
                &mut dir,
                &common,
                &t.filename,
                t.chunk_index,
            ));
        }
        drop(dir);

        for line in &failures {
            manager.audit.record("NODE FAILURE", line).await;
        }
        manager.dispatch_planned(planned).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ManagerMessage;

    async fn manager_with(common: crate::config::CommonConfig) -> Arc<ManagerService> {
        let dir = tempfile::tempdir().unwrap();
        ManagerService::new(common, dir.path().join("audit.log").to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn sweep_reaches_quiescent_replication_factor() {
        let mut common = crate::config::CommonConfig::default();
        common.liveness_timeout_secs = 1;
        common.replication_factor = 2;
        let manager = manager_with(common).await;

        manager
            .handle_message(ManagerMessage::Heartbeat {
                node_id: "n1".into(),
                node_url: "http://n1".into(),
            })
            .await;
        manager
            .handle_message(ManagerMessage::Heartbeat {
                node_id: "n2".into(),
                node_url: "http://n2".into(),
            })
            .await;
        manager
            .handle_message(ManagerMessage::RegisterFile {
                filename: "f".into(),
                chunk_index: 0,
                node_url: "http://n1".into(),
                total_chunks: Some(1),
            })
            .await;

        // RegisterFile already triggers the planner inline when
        // under-replicated, so a second sweep should be a no-op (aside
        // from the liveness check, since these nodes are still active).
        manager.run_sweep_once().await;
        let dir = manager.directory.read().await;
        assert_eq!(dir.files["f"].chunks[&0].len(), 2);
    }

    #[tokio::test]
    async fn inactive_replica_is_pruned_after_grace_period() {
        let mut common = crate::config::CommonConfig::default();
        common.liveness_timeout_secs = 0;
        common.prune_grace_multiplier = 0;
        common.replication_factor = 1;
        let manager = manager_with(common).await;

        manager
            .handle_message(ManagerMessage::Heartbeat {
                node_id: "n1".into(),
                node_url: "http://n1".into(),
            })
            .await;
        manager
            .handle_message(ManagerMessage::RegisterFile {
                filename: "f".into(),
                chunk_index: 0,
                node_url: "http://n1".into(),
                total_chunks: Some(1),
            })
            .await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.run_sweep_once().await;

        let dir = manager.directory.read().await;
        assert!(dir.files["f"].chunks[&0].is_empty());
    }
}
