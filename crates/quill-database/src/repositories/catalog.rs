//! File catalog repository.

use async_trait::async_trait;
use sqlx::PgPool;

use quill_core::error::{AppError, ErrorKind};
use quill_core::result::AppResult;
use quill_entity::catalog::{CatalogFile, CreateCatalogFile};

use crate::ledger::FileCatalog;

/// `files` table access.
#[derive(Debug, Clone)]
pub struct PgFileCatalog {
    pool: PgPool,
}

impl PgFileCatalog {
    /// Create a new catalog repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileCatalog for PgFileCatalog {
    async fn save_completed_file(&self, file: &CreateCatalogFile) -> AppResult<CatalogFile> {
        let inserted = sqlx::query_as::<_, CatalogFile>(
            "INSERT INTO files (file_name, url, format, folder_id, size_bytes, description, content_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (content_hash) WHERE content_hash IS NOT NULL DO NOTHING \
             RETURNING *",
        )
        .bind(&file.file_name)
        .bind(&file.url)
        .bind(&file.format)
        .bind(file.folder_id)
        .bind(file.size_bytes)
        .bind(&file.description)
        .bind(&file.content_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save catalog file", e))?;

        if let Some(file) = inserted {
            return Ok(file);
        }
        let hash = file.content_hash.as_deref().unwrap_or_default();
        self.find_by_content_hash(hash)
            .await?
            .ok_or_else(|| AppError::new(ErrorKind::Database, "Catalog entry vanished after conflict"))
    }

    async fn find_by_content_hash(&self, hash: &str) -> AppResult<Option<CatalogFile>> {
        sqlx::query_as::<_, CatalogFile>(
            "SELECT * FROM files WHERE content_hash = $1 ORDER BY id LIMIT 1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find catalog file", e))
    }
}
