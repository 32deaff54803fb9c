use clap::Parser;
use medtrack_core::{Config, FileStore, KvStore, MemoryStore, Result};
use medtrack_server::AppState;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "medtrack-server")]
#[command(about = "Key-value API server for the medication tracker", long_about = None)]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/medtrack/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8787
    #[arg(long)]
    listen: Option<String>,

    /// Override data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep everything in memory (lost on exit)
    #[arg(long, conflicts_with = "data_dir")]
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    medtrack_core::logging::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let store: Arc<dyn KvStore> = if cli.memory {
        tracing::warn!("Using in-memory store; data will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        let data_dir = cli.data_dir.unwrap_or_else(|| config.store.data_dir.clone());
        Arc::new(FileStore::open(data_dir.join("kv"))?)
    };

    let state = AppState::new(store).with_fallback_user(config.server.fallback_user_id.clone());
    let listen = cli.listen.unwrap_or_else(|| config.server.listen_addr.clone());
    let listener = tokio::net::TcpListener::bind(&listen).await?;

    medtrack_server::serve(listener, state, shutdown_signal()).await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
