//! Structured logging init shared by all three binaries. The teacher pulls
//! in `tracing`/`tracing-subscriber`/`tracing-appender` but never wires up
//! a subscriber; every binary here does, so `tracing::info!`/`warn!` calls
//! in `manager`/`node`/`client` actually go somewhere.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber filtered by `log_level` (falls back to the
/// `RUST_LOG` env var when set). Also tees to `log_path` via a
/// non-blocking file appender when one is given. The returned guard must
/// be held for the process lifetime or buffered lines are dropped.
pub fn init(log_level: &str, log_path: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    match log_path {
        Some(path) => {
            let directory = std::path::Path::new(path)
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "chunkfs.log".to_string());
            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
