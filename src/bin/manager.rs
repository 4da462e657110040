//! Manager binary: owns the node registry and file directory, serves the
//! client-facing HTTP API, and runs the background liveness sweep.

use clap::Parser;
use tokio_util::sync::CancellationToken;

use chunkfs::config::load_config_or_default;
use chunkfs::manager::{api, sweep, ManagerService};

#[derive(Parser, Debug)]
#[command(name = "manager", about = "Runs the chunk store manager")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config_or_default(&args.config);

    let _log_guard = chunkfs::logging::init(&config.common.log_level, config.manager.trace_log_path.as_deref());

    let manager = ManagerService::new(config.common.clone(), config.manager.audit_log_path.clone());

    let shutdown = CancellationToken::new();
    let sweep_handle = sweep::spawn(manager.clone(), shutdown.clone());

    let app = api::router(manager);
    let listener = tokio::net::TcpListener::bind(&config.manager.bind_addr).await?;
    tracing::info!("manager listening on {}", config.manager.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    sweep_handle.await.ok();
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("shutdown signal received");
}
