//! keyfold-server - Single-file JSON sync backend for keyfold
//!
//! Serves the whole root document at /api/sync: GET returns it (creating a
//! canonical empty document on first access), POST validates a root-shaped
//! body and overwrites the backing file. One file, no locking; concurrent
//! writers are last-write-wins.

mod server;
mod store;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use keyfold_core::Paths;
use store::FileStore;

#[derive(Parser)]
#[command(name = "keyfold-server")]
#[command(about = "Single-file JSON sync backend for keyfold")]
#[command(version)]
struct Cli {
    /// Port to listen on (default: KEYFOLD_PORT or 5000)
    #[arg(long)]
    port: Option<u16>,

    /// Backing file for the document (defaults to the keyfold data dir)
    #[arg(long)]
    data_file: Option<PathBuf>,
}

/// Port resolution: flag, then KEYFOLD_PORT, then 5000
fn resolve_port(flag: Option<u16>) -> u16 {
    flag.or_else(|| {
        std::env::var("KEYFOLD_PORT")
            .ok()
            .and_then(|value| value.parse().ok())
    })
    .unwrap_or(5000)
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let port = resolve_port(cli.port);
    let path = cli
        .data_file
        .unwrap_or_else(|| Paths::new().server_store_file());
    let store = FileStore::new(path);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(server::serve(port, store))
}
