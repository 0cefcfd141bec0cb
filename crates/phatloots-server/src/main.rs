mod config;
mod console;
mod handler;
mod persistence;
mod world;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use config::ServerConfig;
use handler::LootHandler;
use persistence::JsonStorage;
use phatloots_engine::{LinkCodec, PhatLoots};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::AsyncBufReadExt;
use tracing::{error, info};

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[tokio::main]
async fn main() {
    let config = match ServerConfig::load_or_default("phatloots.toml") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load phatloots.toml: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        "PhatLoots v{} starting, data directory: {}",
        env!("CARGO_PKG_VERSION"),
        config.storage.directory
    );
    info!(
        "Item links: {:?} encoding, respawn check every {}ms",
        config.links.encoding, config.respawn.tick_interval_ms
    );

    let storage = JsonStorage::new(&config.storage.directory);
    let loots = match PhatLoots::load(LinkCodec::new(config.links.clone()), &storage) {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to load loot data from {}: {e}", storage.root().display());
            std::process::exit(1);
        }
    };

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    // Handle Ctrl+C
    let shutdown_tx_ctrlc = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        let _ = shutdown_tx_ctrlc.send(true);
    });

    // Console REPL: read lines from stdin
    let (console_tx, mut console_rx) = tokio::sync::mpsc::channel::<String>(32);
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let tick_ms = config.respawn.tick_interval_ms.max(1);
    let worker = tokio::spawn(async move {
        let mut handler = LootHandler::new(loots, storage, StdRng::from_entropy());
        let mut tick_interval = tokio::time::interval(Duration::from_millis(tick_ms));
        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    handler.respawn_tick(unix_timestamp());
                }
                Some(line) = console_rx.recv() => {
                    let result = handler.handle_console_command(&line, unix_timestamp());
                    if result.should_stop {
                        let _ = shutdown_tx.send(true);
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Saving loot data before shutdown...");
                        handler.save_all();
                        break;
                    }
                }
            }
        }
    });

    if let Err(e) = worker.await {
        error!("Loot task failed: {e}");
    }
    info!("PhatLoots shut down.");
}
