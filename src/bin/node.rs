//! Storage node binary: serves chunk upload/download/delete, publishes
//! heartbeats, and executes replication orders.

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use chunkfs::config::load_config_or_default;
use chunkfs::node::{api, NodeService};

#[derive(Parser, Debug)]
#[command(name = "node", about = "Runs a chunk storage node")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Overrides `node.advertise_url` from the config file.
    #[arg(long)]
    advertise_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config_or_default(&args.config);

    let _log_guard = chunkfs::logging::init(&config.common.log_level, None);

    let advertise_url = args
        .advertise_url
        .unwrap_or_else(|| {
            if config.node.advertise_url.is_empty() {
                format!("http://{}", config.node.bind_addr)
            } else {
                config.node.advertise_url.clone()
            }
        });

    let node_id = advertise_url.clone();
    let node = Arc::new(NodeService::new(
        node_id,
        advertise_url,
        config.node.storage_dir.clone(),
        config.node.manager_url.clone(),
        config.common.clone(),
    ));

    let shutdown = CancellationToken::new();
    let heartbeat_handle = node.clone().spawn_heartbeat(shutdown.clone());

    let app = api::router(node);
    let listener = tokio::net::TcpListener::bind(&config.node.bind_addr).await?;
    tracing::info!("node listening on {}", config.node.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    heartbeat_handle.await.ok();
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("shutdown signal received");
}
