//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use quill_core::config::AppConfig;
use quill_core::traits::storage::StorageProvider;
use quill_database::{FileCatalog, UploadLedger};
use quill_service::UploadService;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Upload ledger, also probed by the health check
    pub ledger: Arc<dyn UploadLedger>,
    /// Uploads root storage
    pub storage: Arc<dyn StorageProvider>,
    /// Upload coordinator
    pub upload_service: Arc<UploadService>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Wire the upload service from its collaborators.
    pub fn new(
        config: AppConfig,
        ledger: Arc<dyn UploadLedger>,
        catalog: Arc<dyn FileCatalog>,
        storage: Arc<dyn StorageProvider>,
    ) -> Self {
        let upload_service = UploadService::new(
            Arc::clone(&ledger),
            catalog,
            Arc::clone(&storage),
            config.upload.clone(),
        );
        Self {
            config: Arc::new(config),
            ledger,
            storage,
            upload_service: Arc::new(upload_service),
            started_at: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.storage)
            .field("upload_service", &self.upload_service)
            .finish_non_exhaustive()
    }
}
