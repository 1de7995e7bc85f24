//! In-memory ledger and catalog using a Tokio mutex, for tests and
//! database-less development. Semantics match the PostgreSQL repositories.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use quill_core::error::AppError;
use quill_core::result::AppResult;
use quill_entity::catalog::{CatalogFile, CreateCatalogFile};
use quill_entity::upload::{ChunkRecord, ChunkStatus, NewUploadTask, UploadStatus, UploadTask};

use crate::ledger::{FileCatalog, UploadLedger};

#[derive(Debug, Default)]
struct LedgerState {
    next_id: i64,
    tasks: HashMap<String, UploadTask>,
    /// Keyed by `(content_hash, chunk_index)`, so iteration is index-ordered per hash.
    chunks: BTreeMap<(String, i32), ChunkRecord>,
}

impl LedgerState {
    fn find(&self, hash: &str, status: UploadStatus) -> Option<UploadTask> {
        self.tasks
            .get(hash)
            .filter(|t| t.status == status)
            .cloned()
    }

    fn chunks_of<'a>(&'a self, hash: &'a str) -> impl Iterator<Item = &'a ChunkRecord> + 'a {
        self.chunks
            .range((hash.to_string(), i32::MIN)..=(hash.to_string(), i32::MAX))
            .map(|(_, record)| record)
    }
}

/// [`UploadLedger`] held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryUploadLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryUploadLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a task's `updated_at`. Lets tests age a task.
    pub async fn set_updated_at(&self, hash: &str, at: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        if let Some(task) = state.tasks.get_mut(hash) {
            task.updated_at = at;
        }
    }
}

#[async_trait]
impl UploadLedger for MemoryUploadLedger {
    async fn find_completed_by_hash(&self, hash: &str) -> AppResult<Option<UploadTask>> {
        Ok(self.state.lock().await.find(hash, UploadStatus::Completed))
    }

    async fn find_in_progress_by_hash(&self, hash: &str) -> AppResult<Option<UploadTask>> {
        Ok(self.state.lock().await.find(hash, UploadStatus::InProgress))
    }

    async fn find_by_hash(&self, hash: &str) -> AppResult<Option<UploadTask>> {
        Ok(self.state.lock().await.tasks.get(hash).cloned())
    }

    async fn create_task(&self, task: &NewUploadTask) -> AppResult<UploadTask> {
        let mut state = self.state.lock().await;
        if state.tasks.contains_key(&task.content_hash) {
            return Err(AppError::conflict(format!(
                "Upload task for hash '{}' already exists",
                task.content_hash
            )));
        }

        state.next_id += 1;
        let now = Utc::now();
        let created = UploadTask {
            id: state.next_id,
            content_hash: task.content_hash.clone(),
            file_name: task.file_name.clone(),
            file_extension: task.file_extension.clone(),
            total_size: task.total_size,
            chunk_size: task.chunk_size,
            chunk_count: task.chunk_count,
            status: UploadStatus::InProgress,
            final_path: None,
            folder_id: task.folder_id,
            description: task.description.clone(),
            created_at: now,
            updated_at: now,
        };
        state
            .tasks
            .insert(task.content_hash.clone(), created.clone());
        Ok(created)
    }

    async fn restart_failed(&self, task: &NewUploadTask) -> AppResult<Option<UploadTask>> {
        let mut state = self.state.lock().await;
        let Some(existing) = state
            .tasks
            .get_mut(&task.content_hash)
            .filter(|t| t.status == UploadStatus::Failed)
        else {
            return Ok(None);
        };

        existing.status = UploadStatus::InProgress;
        existing.file_name = task.file_name.clone();
        existing.file_extension = task.file_extension.clone();
        existing.total_size = task.total_size;
        existing.chunk_size = task.chunk_size;
        existing.chunk_count = task.chunk_count;
        existing.folder_id = task.folder_id;
        existing.description = task.description.clone();
        existing.final_path = None;
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }

    async fn initialize_chunks(&self, hash: &str, count: i32) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let mut inserted = 0;
        for index in 0..count {
            let key = (hash.to_string(), index);
            if !state.chunks.contains_key(&key) {
                state.chunks.insert(key, ChunkRecord::pending(hash, index));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn mark_chunk_uploaded(
        &self,
        hash: &str,
        index: i32,
        size_bytes: i64,
        storage_path: &str,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(task) = state.tasks.get_mut(hash) {
            task.updated_at = Utc::now();
        }
        let record = state
            .chunks
            .entry((hash.to_string(), index))
            .or_insert_with(|| ChunkRecord::pending(hash, index));
        record.size_bytes = Some(size_bytes);
        record.storage_path = Some(storage_path.to_string());
        record.status = ChunkStatus::Uploaded;
        Ok(())
    }

    async fn chunk_exists(&self, hash: &str, index: i32) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .chunks
            .get(&(hash.to_string(), index))
            .is_some_and(ChunkRecord::is_uploaded))
    }

    async fn list_uploaded_indexes(&self, hash: &str) -> AppResult<Vec<i32>> {
        let state = self.state.lock().await;
        Ok(state
            .chunks_of(hash)
            .filter(|c| c.is_uploaded())
            .map(|c| c.chunk_index)
            .collect())
    }

    async fn list_all_chunks(&self, hash: &str) -> AppResult<Vec<ChunkRecord>> {
        let state = self.state.lock().await;
        Ok(state.chunks_of(hash).cloned().collect())
    }

    async fn mark_completed(&self, hash: &str, final_path: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.tasks.get_mut(hash) {
            Some(task) if task.status == UploadStatus::InProgress => {
                task.status = UploadStatus::Completed;
                task.final_path = Some(final_path.to_string());
                task.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, hash: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.tasks.get_mut(hash) {
            Some(task) if task.status == UploadStatus::InProgress => {
                task.status = UploadStatus::Failed;
                task.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_chunk_records(&self, hash: &str) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.chunks.len();
        state.chunks.retain(|(h, _), _| h != hash);
        Ok((before - state.chunks.len()) as u64)
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<UploadTask>> {
        let state = self.state.lock().await;
        let mut stale: Vec<UploadTask> = state
            .tasks
            .values()
            .filter(|t| t.status == UploadStatus::InProgress && t.updated_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|t| t.updated_at);
        Ok(stale)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

/// [`FileCatalog`] held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileCatalog {
    files: Arc<Mutex<Vec<CatalogFile>>>,
}

impl MemoryFileCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of catalog entries.
    pub async fn len(&self) -> usize {
        self.files.lock().await.len()
    }

    /// Whether the catalog has no entries.
    pub async fn is_empty(&self) -> bool {
        self.files.lock().await.is_empty()
    }
}

#[async_trait]
impl FileCatalog for MemoryFileCatalog {
    async fn save_completed_file(&self, file: &CreateCatalogFile) -> AppResult<CatalogFile> {
        let mut files = self.files.lock().await;
        if let Some(existing) = file
            .content_hash
            .as_deref()
            .and_then(|hash| files.iter().find(|f| f.content_hash.as_deref() == Some(hash)))
        {
            return Ok(existing.clone());
        }
        let entry = CatalogFile {
            id: files.len() as i64 + 1,
            file_name: file.file_name.clone(),
            url: file.url.clone(),
            format: file.format.clone(),
            folder_id: file.folder_id,
            size_bytes: file.size_bytes,
            description: file.description.clone(),
            content_hash: file.content_hash.clone(),
            created_at: Utc::now(),
        };
        files.push(entry.clone());
        Ok(entry)
    }

    async fn find_by_content_hash(&self, hash: &str) -> AppResult<Option<CatalogFile>> {
        let files = self.files.lock().await;
        Ok(files
            .iter()
            .find(|f| f.content_hash.as_deref() == Some(hash))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(hash: &str) -> NewUploadTask {
        NewUploadTask::new(hash, "movie.mp4", 2_621_440, 1_048_576, None, None)
    }

    #[tokio::test]
    async fn test_create_task_rejects_duplicate_hash() {
        let ledger = MemoryUploadLedger::new();
        ledger.create_task(&new_task("h1")).await.unwrap();

        let err = ledger.create_task(&new_task("h1")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_initialize_chunks_ignores_duplicates() {
        let ledger = MemoryUploadLedger::new();
        assert_eq!(ledger.initialize_chunks("h1", 3).await.unwrap(), 3);
        assert_eq!(ledger.initialize_chunks("h1", 3).await.unwrap(), 0);

        let chunks = ledger.list_all_chunks("h1").await.unwrap();
        let indexes: Vec<i32> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(chunks.iter().all(|c| !c.is_uploaded()));
    }

    #[tokio::test]
    async fn test_mark_chunk_uploaded_is_idempotent() {
        let ledger = MemoryUploadLedger::new();
        ledger.initialize_chunks("h1", 6).await.unwrap();

        for index in [5, 0, 2, 0] {
            ledger
                .mark_chunk_uploaded("h1", index, 10, &format!("chunks/h1/{index}"))
                .await
                .unwrap();
        }

        assert_eq!(
            ledger.list_uploaded_indexes("h1").await.unwrap(),
            vec![0, 2, 5]
        );
        assert!(ledger.chunk_exists("h1", 2).await.unwrap());
        assert!(!ledger.chunk_exists("h1", 3).await.unwrap());
        assert_eq!(ledger.list_all_chunks("h1").await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_chunks_are_scoped_per_hash() {
        let ledger = MemoryUploadLedger::new();
        ledger.initialize_chunks("a", 2).await.unwrap();
        ledger.initialize_chunks("b", 4).await.unwrap();

        assert_eq!(ledger.list_all_chunks("a").await.unwrap().len(), 2);
        assert_eq!(ledger.delete_chunk_records("b").await.unwrap(), 4);
        assert_eq!(ledger.list_all_chunks("a").await.unwrap().len(), 2);
        assert!(ledger.list_all_chunks("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let ledger = MemoryUploadLedger::new();
        ledger.create_task(&new_task("h1")).await.unwrap();

        assert!(ledger.find_in_progress_by_hash("h1").await.unwrap().is_some());
        assert!(ledger.mark_completed("h1", "/uploads/f.mp4").await.unwrap());
        assert!(!ledger.mark_completed("h1", "/uploads/g.mp4").await.unwrap());

        let done = ledger.find_completed_by_hash("h1").await.unwrap().unwrap();
        assert_eq!(done.final_path.as_deref(), Some("/uploads/f.mp4"));
        assert!(!ledger.mark_failed("h1").await.unwrap());
    }

    #[tokio::test]
    async fn test_restart_failed_task() {
        let ledger = MemoryUploadLedger::new();
        ledger.create_task(&new_task("h1")).await.unwrap();
        assert!(ledger.restart_failed(&new_task("h1")).await.unwrap().is_none());

        ledger.mark_failed("h1").await.unwrap();
        let restarted = ledger.restart_failed(&new_task("h1")).await.unwrap().unwrap();
        assert!(restarted.is_in_progress());
        assert!(ledger.restart_failed(&new_task("h1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_stale() {
        let ledger = MemoryUploadLedger::new();
        ledger.create_task(&new_task("old")).await.unwrap();
        ledger.create_task(&new_task("fresh")).await.unwrap();
        ledger
            .set_updated_at("old", Utc::now() - chrono::Duration::hours(48))
            .await;

        let stale = ledger
            .find_stale(Utc::now() - chrono::Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].content_hash, "old");
    }

    #[tokio::test]
    async fn test_catalog_lookup_by_hash() {
        let catalog = MemoryFileCatalog::new();
        catalog
            .save_completed_file(&CreateCatalogFile {
                file_name: "movie.mp4".into(),
                url: "/uploads/file-1-2.mp4".into(),
                format: "mp4".into(),
                folder_id: Some(3),
                size_bytes: 42,
                description: None,
                content_hash: Some("h1".into()),
            })
            .await
            .unwrap();

        let found = catalog.find_by_content_hash("h1").await.unwrap().unwrap();
        assert_eq!(found.url, "/uploads/file-1-2.mp4");
        assert!(catalog.find_by_content_hash("h2").await.unwrap().is_none());
        assert_eq!(catalog.len().await, 1);
    }

    #[tokio::test]
    async fn test_catalog_keeps_one_entry_per_hash() {
        let catalog = MemoryFileCatalog::new();
        let entry = |url: &str| CreateCatalogFile {
            file_name: "movie.mp4".into(),
            url: url.into(),
            format: "mp4".into(),
            folder_id: None,
            size_bytes: 42,
            description: None,
            content_hash: Some("h1".into()),
        };

        let first = entry("/uploads/file-1-1.mp4");
        let second = entry("/uploads/file-2-2.mp4");
        let (a, b) = tokio::join!(
            catalog.save_completed_file(&first),
            catalog.save_completed_file(&second),
        );
        assert_eq!(a.unwrap().id, b.unwrap().id);
        assert_eq!(catalog.len().await, 1);
    }
}
