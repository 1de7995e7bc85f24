//! Reclaims storage held by abandoned uploads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use quill_core::result::AppResult;
use quill_database::UploadLedger;
use quill_storage::chunked::{ChunkStore, OrphanChunkCleanup};

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// In-progress tasks marked failed for inactivity.
    pub stale_tasks: usize,
    /// Chunk directories with no in-progress task.
    pub orphan_dirs: usize,
    /// Leftover `.part` files from interrupted chunk writes.
    pub part_files: usize,
}

impl SweepReport {
    /// Whether the sweep removed anything.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Fails uploads idle longer than `stale_after` and deletes chunk data no
/// live task owns.
#[derive(Clone)]
pub struct StaleUploadSweeper {
    ledger: Arc<dyn UploadLedger>,
    store: ChunkStore,
    cleanup: OrphanChunkCleanup,
    stale_after: chrono::Duration,
}

impl std::fmt::Debug for StaleUploadSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaleUploadSweeper")
            .field("stale_after", &self.stale_after)
            .finish()
    }
}

impl StaleUploadSweeper {
    /// Creates a new sweeper.
    pub fn new(
        ledger: Arc<dyn UploadLedger>,
        store: ChunkStore,
        stale_after: chrono::Duration,
    ) -> Self {
        Self {
            ledger,
            cleanup: OrphanChunkCleanup::new(store.clone()),
            store,
            stale_after,
        }
    }

    /// Run one sweep relative to `now`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let cutoff = now - self.stale_after;
        let mut report = SweepReport::default();

        for task in self.ledger.find_stale(cutoff).await? {
            let hash = task.content_hash.as_str();
            // A merge may have completed the task since the query.
            if !self.ledger.mark_failed(hash).await? {
                continue;
            }
            if let Err(e) = self.ledger.delete_chunk_records(hash).await {
                warn!(hash, error = %e, "Failed to delete chunk records of stale upload");
            }
            self.store.delete_task_chunks(hash).await;
            debug!(hash, last_activity = %task.updated_at, "Stale upload failed");
            report.stale_tasks += 1;
        }

        for hash in self.cleanup.list_task_hashes().await? {
            if self.ledger.find_in_progress_by_hash(&hash).await?.is_some() {
                report.part_files += self.cleanup.remove_stale_parts(&hash, cutoff).await?;
            } else if self.cleanup.remove_task(&hash).await {
                debug!(hash = %hash, "Orphan chunk directory removed");
                report.orphan_dirs += 1;
            }
        }

        if report.is_empty() {
            debug!("Upload sweep found nothing to reclaim");
        } else {
            info!(
                stale_tasks = report.stale_tasks,
                orphan_dirs = report.orphan_dirs,
                part_files = report.part_files,
                "Upload sweep completed"
            );
        }
        Ok(report)
    }
}
