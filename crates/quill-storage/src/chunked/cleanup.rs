//! Orphan chunk cleanup.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use quill_core::result::AppResult;

use super::store::{CHUNKS_DIR, ChunkStore, PART_SUFFIX};

/// Finds chunk data that no live upload task owns.
#[derive(Debug, Clone)]
pub struct OrphanChunkCleanup {
    store: ChunkStore,
}

impl OrphanChunkCleanup {
    /// Create a cleanup helper over `store`.
    pub fn new(store: ChunkStore) -> Self {
        Self { store }
    }

    /// Content hashes that currently have a chunk directory.
    pub async fn list_task_hashes(&self) -> AppResult<Vec<String>> {
        let entries = self.store.provider().list(CHUNKS_DIR).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.is_directory)
            .filter_map(|e| e.path.rsplit('/').next().map(str::to_string))
            .collect())
    }

    /// Delete the chunk directory for `hash`.
    pub async fn remove_task(&self, hash: &str) -> bool {
        self.store.delete_task_chunks(hash).await
    }

    /// Delete `.part` files older than `cutoff` left behind by interrupted writes.
    ///
    /// Returns the number of files removed.
    pub async fn remove_stale_parts(&self, hash: &str, cutoff: DateTime<Utc>) -> AppResult<usize> {
        let provider = self.store.provider();
        let mut removed = 0;
        for entry in provider.list(&ChunkStore::chunk_dir(hash)).await? {
            let stale = entry.last_modified.is_some_and(|m| m < cutoff);
            if entry.is_directory || !entry.path.ends_with(PART_SUFFIX) || !stale {
                continue;
            }
            match provider.delete(&entry.path).await {
                Ok(()) => {
                    debug!(path = %entry.path, "Removed stale partial chunk");
                    removed += 1;
                }
                Err(e) => warn!(path = %entry.path, error = %e, "Failed to remove partial chunk"),
            }
        }
        Ok(removed)
    }
}
