// Live auction server entry point.
//
// Startup sequence:
// 1. Load config (copying defaults on first run)
// 2. Initialize tracing (log to file under the configured directory)
// 3. Open database
// 4. Apply seed fixtures, if configured
// 5. Spawn WebSocket server task
// 6. Serve the HTTP API until Ctrl+C

use std::sync::Arc;

use anyhow::Context;
use auction_core::db::Database;
use auction_live::api;
use auction_live::config::{self, Config};
use auction_live::seed;
use auction_live::state::AppState;
use auction_live::ws_server;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = config::load_config().context("failed to load configuration")?;

    // 2. Initialize tracing
    init_tracing(&config)?;
    info!("Auction live server starting up");
    info!(
        "Config loaded: http={}, ws_port={}, outbound_buffer={}",
        config.server.http_addr, config.server.ws_port, config.hub.outbound_buffer
    );

    // 3. Open database
    let db_path = config.db_path();
    let db = Arc::new(Database::open(&db_path).context("failed to open database")?);
    info!("Database opened at {db_path}");

    // 4. Seed fixtures
    if let Some(seed_path) = config.seed_path() {
        if seed_path.exists() {
            seed::load_seed_file(&db, &seed_path)
                .with_context(|| format!("failed to apply seed file {}", seed_path.display()))?;
        } else {
            warn!("Seed file {} not found, skipping", seed_path.display());
        }
    }

    let state = Arc::new(AppState::new(db, config.hub.outbound_buffer));

    // 5. Spawn WebSocket server task
    let ws_port = config.server.ws_port;
    let ws_state = Arc::clone(&state);
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(ws_port, ws_state).await {
            error!("WebSocket server error on port {ws_port}: {e:#}");
        }
    });

    // 6. Serve HTTP until shutdown
    let http_addr = config.http_addr()?;
    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {http_addr}"))?;
    info!("HTTP API listening on {http_addr}");

    axum::serve(listener, api::router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    // The WebSocket server loops forever.
    ws_handle.abort();

    info!("Auction live server shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize tracing to write to `auction-live.log` in the configured
/// log directory. `RUST_LOG` overrides the configured filter.
fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("auction-live.log"))
        .context("failed to open log file")?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
