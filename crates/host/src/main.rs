//! colorwise-sw host entry point.
//!
//! Hosts the offline cache agent behind a line protocol on stdio: one JSON
//! event per stdin line, one JSON reply per stdout line. Logging goes to
//! stderr so it never mixes with replies.

use std::sync::Arc;

use anyhow::Result;
use colorwise_client::{FetchClient, FetchConfig};
use colorwise_core::{AppConfig, CacheDb, CacheStorage, MemoryStorage, StorageBackend};
use colorwise_worker::Registration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod protocol;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    let origin = config.origin_url()?;

    let storage: Arc<dyn CacheStorage> = match config.storage {
        StorageBackend::Sqlite => Arc::new(CacheDb::open(&config.db_path).await?),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };
    let network = Arc::new(FetchClient::new(FetchConfig::from_app_config(&config))?);

    tracing::info!(version = %config.version, scope = %config.scope, storage = ?config.storage, "starting colorwise-sw on stdio");

    let host = handler::Host::new(Registration::new(config, storage, network), origin);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = host.handle_line(&line).await;
        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    host.shutdown().await;
    tracing::info!("stdin closed, shutting down");

    Ok(())
}
