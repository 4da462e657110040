//! Non-interactive client CLI: `client upload <path>`, `client download
//! <filename> <destination>`, `client list`, `client remove <filename>`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use chunkfs::client::Client;
use chunkfs::config::load_config_or_default;

#[derive(Parser, Debug)]
#[command(name = "client", about = "Talks to a chunk store manager")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Splits a file into chunks and uploads them to the storage nodes.
    Upload { path: PathBuf },
    /// Reassembles a file from its chunks and writes it to `destination`.
    Download { filename: String, destination: PathBuf },
    /// Prints the full file -> chunk -> replica directory.
    List,
    /// Removes a file and all of its chunks.
    Remove { filename: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config_or_default(&args.config);
    let _log_guard = chunkfs::logging::init(&config.common.log_level, None);

    let client = Client::new(config.client.manager_url.clone(), config.common.clone());

    match args.command {
        Command::Upload { path } => {
            let summary = client.upload(&path).await?;
            println!(
                "uploaded {} chunks ({} failed)",
                summary.total_chunks,
                summary.failed_chunks.len()
            );
            if !summary.failed_chunks.is_empty() {
                eprintln!("failed chunk indices: {:?}", summary.failed_chunks);
            }
        }
        Command::Download { filename, destination } => {
            client.download(&filename, &destination).await?;
            println!("downloaded '{}' to {}", filename, destination.display());
        }
        Command::List => {
            let directory = client.list().await?;
            for (filename, chunks) in directory {
                println!("{}:", filename);
                for (chunk_index, replicas) in chunks {
                    println!("  chunk {} -> {:?}", chunk_index, replicas);
                }
            }
        }
        Command::Remove { filename } => {
            client.remove(&filename).await?;
            println!("removed '{}'", filename);
        }
    }

    Ok(())
}
