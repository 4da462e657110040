//! Append-only audit log: one line per event, `REGISTER`/`REPLICATE`/
//! `REMOVE`/`NODE FAILURE`. Kept separate from the `tracing` structured log
//! stream because its line format is part of the external interface, not
//! an operator-facing log.

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct AuditLog {
    path: String,
    lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub async fn record(&self, operation: &str, details: &str) {
        let _guard = self.lock.lock().await;
        let line = format!(
            "{} - {} - {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            operation,
            details
        );
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
        {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()).await {
                    tracing::error!("failed to append to audit log {}: {}", self.path, e);
                }
            }
            Err(e) => tracing::error!("failed to open audit log {}: {}", self.path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = AuditLog::new(path.to_str().unwrap());
        log.record("REGISTER", "f - Chunk 0 registered on http://n1")
            .await;
        log.record("REPLICATE", "f - Chunk 0 replicated to http://n2")
            .await;
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("REGISTER"));
        assert!(lines[1].contains("REPLICATE"));
    }
}
