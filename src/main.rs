//! Quill Server: chunked large-file upload service
//!
//! Main entry point that wires the crates together and starts the server.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use quill_core::config::AppConfig;
use quill_core::error::AppError;
use quill_database::{DatabasePool, FileCatalog, PgFileCatalog, PgUploadLedger, UploadLedger};

#[tokio::main]
async fn main() {
    let env = std::env::var("QUILL_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Quill v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    let db = DatabasePool::connect(&config.database).await?;

    // ── Step 2: Ledger and catalog ───────────────────────────────
    let ledger: Arc<dyn UploadLedger> = Arc::new(PgUploadLedger::new(db.pool().clone()));
    let catalog: Arc<dyn FileCatalog> = Arc::new(PgFileCatalog::new(db.pool().clone()));

    // ── Step 3: HTTP server and sweeper ──────────────────────────
    let result = quill_api::run_server(config, ledger, catalog).await;

    db.close().await;
    result
}
