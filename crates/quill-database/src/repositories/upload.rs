//! Upload ledger repository over `large_files` and `file_chunks`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use quill_core::error::{AppError, ErrorKind};
use quill_core::result::AppResult;
use quill_entity::upload::{ChunkRecord, NewUploadTask, UploadTask};

use crate::ledger::UploadLedger;

/// PostgreSQL-backed [`UploadLedger`].
#[derive(Debug, Clone)]
pub struct PgUploadLedger {
    pool: PgPool,
}

impl PgUploadLedger {
    /// Create a new ledger repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_with_status(&self, hash: &str, status: &str) -> AppResult<Option<UploadTask>> {
        sqlx::query_as::<_, UploadTask>(
            "SELECT * FROM large_files WHERE content_hash = $1 AND status = $2::upload_status",
        )
        .bind(hash)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find upload task", e))
    }
}

#[async_trait]
impl UploadLedger for PgUploadLedger {
    async fn find_completed_by_hash(&self, hash: &str) -> AppResult<Option<UploadTask>> {
        self.find_with_status(hash, "completed").await
    }

    async fn find_in_progress_by_hash(&self, hash: &str) -> AppResult<Option<UploadTask>> {
        self.find_with_status(hash, "in_progress").await
    }

    async fn find_by_hash(&self, hash: &str) -> AppResult<Option<UploadTask>> {
        sqlx::query_as::<_, UploadTask>("SELECT * FROM large_files WHERE content_hash = $1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find upload task", e)
            })
    }

    async fn create_task(&self, task: &NewUploadTask) -> AppResult<UploadTask> {
        sqlx::query_as::<_, UploadTask>(
            "INSERT INTO large_files \
             (content_hash, file_name, file_extension, total_size, chunk_size, chunk_count, folder_id, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(&task.content_hash)
        .bind(&task.file_name)
        .bind(&task.file_extension)
        .bind(task.total_size)
        .bind(task.chunk_size)
        .bind(task.chunk_count)
        .bind(task.folder_id)
        .bind(&task.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some("large_files_content_hash_key") =>
            {
                AppError::conflict(format!(
                    "Upload task for hash '{}' already exists",
                    task.content_hash
                ))
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create upload task", e),
        })
    }

    async fn restart_failed(&self, task: &NewUploadTask) -> AppResult<Option<UploadTask>> {
        sqlx::query_as::<_, UploadTask>(
            "UPDATE large_files SET status = 'in_progress', file_name = $2, file_extension = $3, \
             total_size = $4, chunk_size = $5, chunk_count = $6, folder_id = $7, description = $8, \
             final_path = NULL, updated_at = NOW() \
             WHERE content_hash = $1 AND status = 'failed' RETURNING *",
        )
        .bind(&task.content_hash)
        .bind(&task.file_name)
        .bind(&task.file_extension)
        .bind(task.total_size)
        .bind(task.chunk_size)
        .bind(task.chunk_count)
        .bind(task.folder_id)
        .bind(&task.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to restart upload task", e))
    }

    async fn initialize_chunks(&self, hash: &str, count: i32) -> AppResult<u64> {
        let result = sqlx::query(
            "INSERT INTO file_chunks (content_hash, chunk_index, chunk_hash, status) \
             SELECT $1, i, $1 || '-' || i::text, 'pending'::chunk_status \
             FROM generate_series(0, $2 - 1) AS i \
             ON CONFLICT DO NOTHING",
        )
        .bind(hash)
        .bind(count)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to initialize chunks", e))?;
        Ok(result.rows_affected())
    }

    async fn mark_chunk_uploaded(
        &self,
        hash: &str,
        index: i32,
        size_bytes: i64,
        storage_path: &str,
    ) -> AppResult<()> {
        sqlx::query(
            "WITH touched AS ( \
                UPDATE large_files SET updated_at = NOW() WHERE content_hash = $1 \
             ) \
             INSERT INTO file_chunks (content_hash, chunk_index, chunk_hash, size_bytes, storage_path, status) \
             VALUES ($1, $2, $1 || '-' || $2::text, $3, $4, 'uploaded') \
             ON CONFLICT (content_hash, chunk_index) DO UPDATE \
             SET size_bytes = EXCLUDED.size_bytes, storage_path = EXCLUDED.storage_path, status = 'uploaded'",
        )
        .bind(hash)
        .bind(index)
        .bind(size_bytes)
        .bind(storage_path)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record chunk", e))?;
        Ok(())
    }

    async fn chunk_exists(&self, hash: &str, index: i32) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM file_chunks \
             WHERE content_hash = $1 AND chunk_index = $2 AND status = 'uploaded')",
        )
        .bind(hash)
        .bind(index)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check chunk", e))
    }

    async fn list_uploaded_indexes(&self, hash: &str) -> AppResult<Vec<i32>> {
        sqlx::query_scalar::<_, i32>(
            "SELECT chunk_index FROM file_chunks \
             WHERE content_hash = $1 AND status = 'uploaded' ORDER BY chunk_index",
        )
        .bind(hash)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list uploaded chunks", e)
        })
    }

    async fn list_all_chunks(&self, hash: &str) -> AppResult<Vec<ChunkRecord>> {
        sqlx::query_as::<_, ChunkRecord>(
            "SELECT * FROM file_chunks WHERE content_hash = $1 ORDER BY chunk_index",
        )
        .bind(hash)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list chunks", e))
    }

    async fn mark_completed(&self, hash: &str, final_path: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE large_files SET status = 'completed', final_path = $2, updated_at = NOW() \
             WHERE content_hash = $1 AND status = 'in_progress'",
        )
        .bind(hash)
        .bind(final_path)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to mark task completed", e)
        })?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, hash: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE large_files SET status = 'failed', updated_at = NOW() \
             WHERE content_hash = $1 AND status = 'in_progress'",
        )
        .bind(hash)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark task failed", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_chunk_records(&self, hash: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM file_chunks WHERE content_hash = $1")
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete chunk records", e)
            })?;
        Ok(result.rows_affected())
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<UploadTask>> {
        sqlx::query_as::<_, UploadTask>(
            "SELECT * FROM large_files WHERE status = 'in_progress' AND updated_at < $1 \
             ORDER BY updated_at",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find stale tasks", e))
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }
}
