//! Application builder: wires router, middleware and state into an Axum app,
//! and runs the server alongside the upload sweeper.

use std::sync::Arc;

use axum::Router;
use axum::middleware as axum_middleware;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use quill_core::config::AppConfig;
use quill_core::error::{AppError, ErrorKind};
use quill_core::result::AppResult;
use quill_core::traits::storage::StorageProvider;
use quill_database::{FileCatalog, UploadLedger};
use quill_service::StaleUploadSweeper;
use quill_storage::LocalStorageProvider;
use quill_storage::chunked::ChunkStore;
use quill_worker::SweepRunner;

use crate::middleware::cors::build_cors_layer;
use crate::middleware::logging::request_logging;
use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors);
    build_router(state)
        .layer(axum_middleware::from_fn(request_logging))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Runs the Quill server until Ctrl+C (or SIGTERM).
///
/// The upload sweeper runs in the background when `worker.enabled` is set
/// and is stopped after the server drains.
pub async fn run_server(
    config: AppConfig,
    ledger: Arc<dyn UploadLedger>,
    catalog: Arc<dyn FileCatalog>,
) -> AppResult<()> {
    tracing::info!("Starting Quill server...");

    let provider = LocalStorageProvider::new(&config.upload.root).await?;
    tracing::info!(root = %provider.root().display(), "Uploads root ready");
    let storage: Arc<dyn StorageProvider> = Arc::new(provider);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper_handle = if config.worker.enabled {
        let sweeper = StaleUploadSweeper::new(
            Arc::clone(&ledger),
            ChunkStore::new(Arc::clone(&storage)),
            config.upload.stale_after(),
        );
        let runner = SweepRunner::from_config(sweeper, &config.worker);
        let cancel = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            runner.run(cancel).await;
        }))
    } else {
        tracing::info!("Upload sweeper disabled");
        None
    };

    let addr = config.server.bind_addr();
    let app = build_app(AppState::new(config, ledger, catalog, storage));

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::with_source(ErrorKind::Configuration, format!("Failed to bind {addr}"), e)
    })?;

    tracing::info!(addr = %addr, "Quill server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Server error", e))?;

    if let Some(handle) = sweeper_handle {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Upload sweeper task ended abnormally");
        }
    }

    tracing::info!("Quill server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
