//! Ledger and catalog traits consumed by the upload service.
//!
//! Every state transition is a single idempotent operation, so concurrent
//! requests for the same content hash need no application-level locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use quill_core::result::AppResult;
use quill_entity::catalog::{CatalogFile, CreateCatalogFile};
use quill_entity::upload::{ChunkRecord, NewUploadTask, UploadTask};

/// Persistent record of upload tasks and per-chunk completion state.
#[async_trait]
pub trait UploadLedger: Send + Sync + 'static {
    /// The completed task for `hash`, if any.
    async fn find_completed_by_hash(&self, hash: &str) -> AppResult<Option<UploadTask>>;

    /// The in-progress task for `hash`, if any.
    async fn find_in_progress_by_hash(&self, hash: &str) -> AppResult<Option<UploadTask>>;

    /// The task for `hash` in any state.
    async fn find_by_hash(&self, hash: &str) -> AppResult<Option<UploadTask>>;

    /// Insert a new in-progress task.
    ///
    /// Fails with a `Conflict` error when a task for the hash already exists.
    async fn create_task(&self, task: &NewUploadTask) -> AppResult<UploadTask>;

    /// Reset a failed task to in-progress with fresh metadata.
    ///
    /// Returns `None` when there is no failed task for the hash (for example
    /// because a concurrent request restarted it first).
    async fn restart_failed(&self, task: &NewUploadTask) -> AppResult<Option<UploadTask>>;

    /// Insert `count` pending chunk records, ignoring ones that already exist.
    ///
    /// Returns the number of records actually inserted.
    async fn initialize_chunks(&self, hash: &str, count: i32) -> AppResult<u64>;

    /// Record chunk `index` as uploaded. Safe to repeat.
    async fn mark_chunk_uploaded(
        &self,
        hash: &str,
        index: i32,
        size_bytes: i64,
        storage_path: &str,
    ) -> AppResult<()>;

    /// Whether chunk `index` is recorded as uploaded.
    async fn chunk_exists(&self, hash: &str, index: i32) -> AppResult<bool>;

    /// Indexes of uploaded chunks, ascending.
    async fn list_uploaded_indexes(&self, hash: &str) -> AppResult<Vec<i32>>;

    /// All chunk records for `hash`, ordered by index.
    async fn list_all_chunks(&self, hash: &str) -> AppResult<Vec<ChunkRecord>>;

    /// Transition an in-progress task to completed.
    ///
    /// Returns `false` if the task was not in progress, which means another
    /// request completed (or failed) it first.
    async fn mark_completed(&self, hash: &str, final_path: &str) -> AppResult<bool>;

    /// Transition an in-progress task to failed.
    async fn mark_failed(&self, hash: &str) -> AppResult<bool>;

    /// Delete every chunk record for `hash`.
    async fn delete_chunk_records(&self, hash: &str) -> AppResult<u64>;

    /// In-progress tasks not updated since `cutoff`.
    async fn find_stale(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<UploadTask>>;

    /// Whether the backing store is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}

/// The file catalog owned by the surrounding CRUD layer.
#[async_trait]
pub trait FileCatalog: Send + Sync + 'static {
    /// Insert the catalog entry for a merged upload.
    ///
    /// Entries are unique per content hash: if one already exists it is
    /// returned and nothing is inserted.
    async fn save_completed_file(&self, file: &CreateCatalogFile) -> AppResult<CatalogFile>;

    /// The entry produced by the upload with `hash`, if any.
    async fn find_by_content_hash(&self, hash: &str) -> AppResult<Option<CatalogFile>>;
}
