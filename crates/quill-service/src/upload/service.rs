//! Upload coordinator: the per-hash state machine behind verify, chunk and merge.
//!
//! States per content hash: unknown, in progress, completed (and failed,
//! which the next verify restarts). No in-process locks are taken; every
//! transition relies on the ledger's idempotent, conditional writes.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use quill_core::config::upload::UploadConfig;
use quill_core::error::UploadError;
use quill_core::result::UploadResult;
use quill_core::traits::storage::StorageProvider;
use quill_database::{FileCatalog, UploadLedger};
use quill_entity::catalog::{CatalogFile, CreateCatalogFile};
use quill_entity::upload::{NewUploadTask, UploadTask};
use quill_storage::chunked::{ChunkAssembler, ChunkLocation, ChunkStore, is_valid_content_hash};

use super::types::{
    ChunkAck, FileInfo, MergeOutcome, MergeRequest, UploadStatusReport, VerifyRequest,
    VerifyResult,
};

/// Runs the chunked upload protocol.
#[derive(Clone)]
pub struct UploadService {
    ledger: Arc<dyn UploadLedger>,
    catalog: Arc<dyn FileCatalog>,
    store: ChunkStore,
    assembler: ChunkAssembler,
    config: UploadConfig,
}

impl std::fmt::Debug for UploadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadService")
            .field("root", &self.config.root)
            .finish()
    }
}

impl UploadService {
    /// Creates a new upload service over the uploads `provider`.
    pub fn new(
        ledger: Arc<dyn UploadLedger>,
        catalog: Arc<dyn FileCatalog>,
        provider: Arc<dyn StorageProvider>,
        config: UploadConfig,
    ) -> Self {
        let store = ChunkStore::new(provider);
        Self {
            ledger,
            catalog,
            assembler: ChunkAssembler::new(store.clone()),
            store,
            config,
        }
    }

    /// The ledger this service writes to.
    pub fn ledger(&self) -> &Arc<dyn UploadLedger> {
        &self.ledger
    }

    /// The chunk store.
    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    /// Upload configuration.
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Decide whether the client must upload, and which chunks.
    ///
    /// A completed task for the hash short-circuits (instant upload). An
    /// in-progress task reports its uploaded chunks (resume). Otherwise a
    /// task and its pending chunk records are created.
    pub async fn verify(&self, req: VerifyRequest) -> UploadResult<VerifyResult> {
        validate_hash(&req.content_hash)?;
        validate_name(&req.file_name)?;
        validate_size(req.total_size)?;
        if req.chunk_size <= 0 {
            return Err(UploadError::invalid("chunkSize must be a positive integer"));
        }
        if req.chunk_size as u64 > self.config.max_chunk_size_bytes {
            return Err(UploadError::invalid(format!(
                "chunkSize exceeds the {} byte limit",
                self.config.max_chunk_size_bytes
            )));
        }
        if (req.total_size - 1) / req.chunk_size >= i32::MAX as i64 {
            return Err(UploadError::invalid("file has too many chunks"));
        }

        let hash = req.content_hash.as_str();
        if let Some(result) = self.existing_state(hash).await? {
            return Ok(result);
        }

        let new_task = NewUploadTask::new(
            hash,
            req.file_name.as_str(),
            req.total_size,
            req.chunk_size,
            req.folder_id,
            req.description.clone(),
        );

        match self.ledger.create_task(&new_task).await {
            Ok(task) => {
                self.ledger
                    .initialize_chunks(hash, task.chunk_count)
                    .await?;
                info!(
                    hash,
                    file_name = %task.file_name,
                    total_size = task.total_size,
                    chunk_count = task.chunk_count,
                    "Upload task created"
                );
                Ok(fresh_upload(&task))
            }
            Err(e) if e.is_conflict() => {
                // Either a failed task exists or a concurrent verify won the insert.
                if let Some(task) = self.ledger.restart_failed(&new_task).await? {
                    self.ledger.delete_chunk_records(hash).await?;
                    self.store.delete_task_chunks(hash).await;
                    self.ledger
                        .initialize_chunks(hash, task.chunk_count)
                        .await?;
                    info!(hash, chunk_count = task.chunk_count, "Failed upload restarted");
                    return Ok(fresh_upload(&task));
                }
                match self.existing_state(hash).await? {
                    Some(result) => Ok(result),
                    None => Err(UploadError::DuplicateHash(hash.to_string())),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn existing_state(&self, hash: &str) -> UploadResult<Option<VerifyResult>> {
        if let Some(task) = self.ledger.find_completed_by_hash(hash).await? {
            debug!(hash, "Instant upload: content already stored");
            return Ok(Some(VerifyResult::AlreadyUploaded {
                file: FileInfo::from(&task),
            }));
        }

        if let Some(task) = self.ledger.find_in_progress_by_hash(hash).await? {
            let uploaded_indexes = self
                .ledger
                .list_uploaded_indexes(hash)
                .await?
                .into_iter()
                .map(|i| i as u32)
                .collect::<Vec<_>>();
            debug!(
                hash,
                uploaded = uploaded_indexes.len(),
                chunk_count = task.chunk_count,
                "Resuming upload"
            );
            return Ok(Some(VerifyResult::NeedsUpload {
                uploaded_indexes,
                chunk_count: task.chunk_count as u32,
                resumed: true,
            }));
        }

        Ok(None)
    }

    /// Accept one chunk.
    ///
    /// Chunks may arrive in any order and may be repeated. A chunk already
    /// recorded is acknowledged without touching storage.
    pub async fn upload_chunk(
        &self,
        hash: &str,
        index: i64,
        data: Bytes,
    ) -> UploadResult<ChunkAck> {
        validate_hash(hash)?;
        if index < 0 || index > i32::MAX as i64 {
            return Err(UploadError::invalid("chunkIndex must be a non-negative integer"));
        }
        if data.is_empty() {
            return Err(UploadError::invalid("no chunk data received"));
        }
        if data.len() as u64 > self.config.max_chunk_size_bytes {
            return Err(UploadError::invalid(format!(
                "chunk exceeds the {} byte limit",
                self.config.max_chunk_size_bytes
            )));
        }
        let size_bytes = data.len() as u64;

        if let Some(task) = self.ledger.find_completed_by_hash(hash).await? {
            debug!(hash, index, "Chunk for completed upload discarded");
            return Ok(ChunkAck::AlreadyComplete {
                file: FileInfo::from(&task),
            });
        }

        let task = self
            .ledger
            .find_in_progress_by_hash(hash)
            .await?
            .ok_or_else(|| UploadError::TaskNotFound(hash.to_string()))?;
        if index >= task.chunk_count as i64 {
            return Err(UploadError::invalid(format!(
                "chunkIndex {index} out of range (chunk count {})",
                task.chunk_count
            )));
        }
        let index = index as u32;

        if self.ledger.chunk_exists(hash, index as i32).await? {
            debug!(hash, index, "Duplicate chunk skipped");
            return Ok(ChunkAck::Duplicate { index, size_bytes });
        }

        let path = self
            .store
            .put_chunk(hash, index, data)
            .await
            .map_err(|source| UploadError::ChunkPersistFailed { index, source })?;
        self.ledger
            .mark_chunk_uploaded(hash, index as i32, size_bytes as i64, &path)
            .await
            .map_err(|source| UploadError::ChunkPersistFailed { index, source })?;

        debug!(hash, index, bytes = size_bytes, "Chunk stored");
        Ok(ChunkAck::Stored { index, size_bytes })
    }

    /// Reassemble a fully uploaded task into its final file.
    ///
    /// The whole attempt (preconditions and reassembly) is retried after a
    /// fixed delay when it fails with a retryable error. Precondition
    /// failures and hash mismatches are returned immediately. If every
    /// attempt fails the task and its chunks are left intact so the merge
    /// can be requested again.
    pub async fn merge(&self, req: MergeRequest) -> UploadResult<MergeOutcome> {
        validate_hash(&req.content_hash)?;
        validate_name(&req.file_name)?;
        validate_size(req.total_size)?;

        let attempts = self.config.merge_max_retries + 1;
        let mut attempt = 1;
        loop {
            match self.merge_once(&req).await {
                Ok(outcome) => return Ok(outcome),
                Err(
                    e @ (UploadError::TaskNotFound(_) | UploadError::IncompleteChunks { .. }),
                ) => {
                    // A concurrent merge may have completed the task and
                    // released its chunks between our checks.
                    return match self.completed_outcome(&req).await? {
                        Some(outcome) => Ok(outcome),
                        None => Err(e),
                    };
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= attempts => {
                    error!(
                        hash = %req.content_hash,
                        attempts,
                        error = %e,
                        "Merge failed, retries exhausted"
                    );
                    return Err(UploadError::MergeFailed {
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!(
                        hash = %req.content_hash,
                        attempt,
                        attempts,
                        error = %e,
                        "Merge attempt failed, retrying"
                    );
                    tokio::time::sleep(self.config.merge_retry_delay()).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn completed_outcome(&self, req: &MergeRequest) -> UploadResult<Option<MergeOutcome>> {
        let Some(task) = self.ledger.find_completed_by_hash(&req.content_hash).await? else {
            return Ok(None);
        };
        self.ensure_catalog_entry(&task, req).await?;
        Ok(Some(MergeOutcome::AlreadyComplete {
            file: FileInfo::from(&task),
        }))
    }

    async fn merge_once(&self, req: &MergeRequest) -> UploadResult<MergeOutcome> {
        let hash = req.content_hash.as_str();

        if let Some(outcome) = self.completed_outcome(req).await? {
            return Ok(outcome);
        }

        let task = self
            .ledger
            .find_in_progress_by_hash(hash)
            .await?
            .ok_or_else(|| UploadError::TaskNotFound(hash.to_string()))?;

        let records = self.ledger.list_all_chunks(hash).await?;
        let uploaded = records.iter().filter(|c| c.is_uploaded()).count() as u32;
        let total = (task.chunk_count as u32).max(records.len() as u32);
        if records.is_empty() || uploaded < total {
            return Err(UploadError::IncompleteChunks { uploaded, total });
        }

        let locations = records
            .iter()
            .map(|c| {
                let index = c.chunk_index as u32;
                c.storage_path
                    .clone()
                    .map(|path| ChunkLocation { index, path })
                    .ok_or_else(|| UploadError::ChunkMissing {
                        index,
                        path: ChunkStore::chunk_path(hash, index),
                    })
            })
            .collect::<UploadResult<Vec<_>>>()?;

        let assembled = self
            .assembler
            .assemble(locations, &task.file_extension)
            .await?;

        if self.config.verify_content_hash && is_md5_hex(hash) {
            let expected = hash.to_ascii_lowercase();
            if assembled.md5_hex != expected {
                self.assembler.discard(&assembled.file_name).await;
                self.reject_task(hash).await;
                warn!(
                    hash,
                    computed = %assembled.md5_hex,
                    "Merged content does not match its hash, task rejected"
                );
                return Err(UploadError::HashMismatch {
                    expected,
                    actual: assembled.md5_hex,
                });
            }
        }

        let final_path = format!("/uploads/{}", assembled.file_name);
        if !self.ledger.mark_completed(hash, &final_path).await? {
            // A concurrent merge finished first; keep its file, drop ours.
            self.assembler.discard(&assembled.file_name).await;
            return match self.ledger.find_completed_by_hash(hash).await? {
                Some(task) => Ok(MergeOutcome::AlreadyComplete {
                    file: FileInfo::from(&task),
                }),
                None => Err(UploadError::TaskNotFound(hash.to_string())),
            };
        }

        let file = self
            .catalog
            .save_completed_file(&catalog_entry(&task, req, &final_path, assembled.size_bytes))
            .await?;

        info!(
            hash,
            file_name = %req.file_name,
            url = %final_path,
            bytes = assembled.size_bytes,
            "Upload merged"
        );

        self.release_chunks(hash).await;
        Ok(MergeOutcome::Merged { file })
    }

    /// Insert the catalog entry for a completed task if it is missing.
    async fn ensure_catalog_entry(&self, task: &UploadTask, req: &MergeRequest) -> UploadResult<()> {
        if self.catalog.find_by_content_hash(&task.content_hash).await?.is_some() {
            return Ok(());
        }
        let Some(final_path) = task.final_path.as_deref() else {
            return Ok(());
        };
        warn!(hash = %task.content_hash, "Completed upload had no catalog entry, restoring");
        self.catalog
            .save_completed_file(&catalog_entry(task, req, final_path, task.total_size as u64))
            .await?;
        Ok(())
    }

    /// Delete chunk files and records after a successful merge. Best effort.
    async fn release_chunks(&self, hash: &str) {
        if self.store.delete_task_chunks(hash).await {
            if let Err(e) = self.ledger.delete_chunk_records(hash).await {
                warn!(hash, error = %e, "Failed to delete chunk records");
            }
        }
    }

    /// Mark a task failed and purge its chunks. Best effort.
    async fn reject_task(&self, hash: &str) {
        if let Err(e) = self.ledger.mark_failed(hash).await {
            warn!(hash, error = %e, "Failed to mark task failed");
        }
        if let Err(e) = self.ledger.delete_chunk_records(hash).await {
            warn!(hash, error = %e, "Failed to delete chunk records");
        }
        self.store.delete_task_chunks(hash).await;
    }

    /// Task and chunk progress for `hash`.
    pub async fn status(&self, hash: &str) -> UploadResult<UploadStatusReport> {
        validate_hash(hash)?;
        let task = self
            .ledger
            .find_by_hash(hash)
            .await?
            .ok_or_else(|| UploadError::TaskNotFound(hash.to_string()))?;
        let chunks = self.ledger.list_all_chunks(hash).await?;
        Ok(UploadStatusReport { task, chunks })
    }
}

fn fresh_upload(task: &UploadTask) -> VerifyResult {
    VerifyResult::NeedsUpload {
        uploaded_indexes: Vec::new(),
        chunk_count: task.chunk_count as u32,
        resumed: false,
    }
}

fn catalog_entry(
    task: &UploadTask,
    req: &MergeRequest,
    final_path: &str,
    size_bytes: u64,
) -> CreateCatalogFile {
    CreateCatalogFile {
        file_name: req.file_name.clone(),
        url: final_path.to_string(),
        format: task.file_extension.trim_start_matches('.').to_string(),
        folder_id: req.folder_id.or(task.folder_id),
        size_bytes: size_bytes as i64,
        description: req.description.clone().or_else(|| task.description.clone()),
        content_hash: Some(task.content_hash.clone()),
    }
}

fn validate_hash(hash: &str) -> UploadResult<()> {
    if hash.is_empty() {
        return Err(UploadError::invalid("fileHash is required"));
    }
    if !is_valid_content_hash(hash) {
        return Err(UploadError::invalid(
            "fileHash may only contain letters, digits, '-' and '_' (max 128)",
        ));
    }
    Ok(())
}

fn validate_name(file_name: &str) -> UploadResult<()> {
    if file_name.trim().is_empty() {
        return Err(UploadError::invalid("fileName is required"));
    }
    Ok(())
}

fn validate_size(total_size: i64) -> UploadResult<()> {
    if total_size <= 0 {
        return Err(UploadError::invalid("size must be a positive integer"));
    }
    Ok(())
}

/// 32 hex digits, the shape of an MD5 digest.
fn is_md5_hex(hash: &str) -> bool {
    hash.len() == 32 && hash.chars().all(|c| c.is_ascii_hexdigit())
}
