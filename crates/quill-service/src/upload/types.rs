//! Requests and outcomes of the upload protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quill_entity::catalog::CatalogFile;
use quill_entity::upload::{ChunkRecord, UploadStatus, UploadTask};

/// Parameters of `verify`.
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    /// Client-computed hash of the whole file.
    pub content_hash: String,
    /// Original file name.
    pub file_name: String,
    /// Total size in bytes.
    pub total_size: i64,
    /// Size the client slices chunks at.
    pub chunk_size: i64,
    /// Destination folder.
    pub folder_id: Option<i64>,
    /// Description for the catalog entry.
    pub description: Option<String>,
}

/// Parameters of `merge`.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Content hash of the task to merge.
    pub content_hash: String,
    /// Name recorded in the catalog.
    pub file_name: String,
    /// Total size in bytes.
    pub total_size: i64,
    /// Destination folder, overriding the one given at verify.
    pub folder_id: Option<i64>,
    /// Description, overriding the one given at verify.
    pub description: Option<String>,
}

/// Metadata of a completed upload, returned on dedup hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Task id.
    pub id: i64,
    /// Original file name.
    pub file_name: String,
    /// Public path of the merged file.
    pub file_path: Option<String>,
    /// Size in bytes.
    pub file_size: i64,
    /// Task status.
    pub status: UploadStatus,
    /// When the task was created.
    pub create_time: DateTime<Utc>,
    /// When the task last changed.
    pub update_time: DateTime<Utc>,
}

impl From<&UploadTask> for FileInfo {
    fn from(task: &UploadTask) -> Self {
        Self {
            id: task.id,
            file_name: task.file_name.clone(),
            file_path: task.final_path.clone(),
            file_size: task.total_size,
            status: task.status,
            create_time: task.created_at,
            update_time: task.updated_at,
        }
    }
}

/// Outcome of `verify`.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyResult {
    /// The same content was uploaded before. Nothing needs transferring.
    AlreadyUploaded {
        /// The existing file.
        file: FileInfo,
    },
    /// The client must upload every chunk not listed.
    NeedsUpload {
        /// Indexes already stored, ascending.
        uploaded_indexes: Vec<u32>,
        /// Chunks the task expects.
        chunk_count: u32,
        /// Whether an unfinished task was found.
        resumed: bool,
    },
}

/// Outcome of `upload_chunk`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkAck {
    /// The chunk was written and recorded.
    Stored {
        /// Chunk index.
        index: u32,
        /// Bytes stored.
        size_bytes: u64,
    },
    /// The chunk was already recorded. The bytes were discarded.
    Duplicate {
        /// Chunk index.
        index: u32,
        /// Bytes received and discarded.
        size_bytes: u64,
    },
    /// The whole upload already finished. The client should stop sending.
    AlreadyComplete {
        /// The existing file.
        file: FileInfo,
    },
}

/// Outcome of `merge`.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// This call produced the file.
    Merged {
        /// The new catalog entry; `url` is the public path.
        file: CatalogFile,
    },
    /// The task was completed earlier (or by a concurrent call).
    AlreadyComplete {
        /// The existing file.
        file: FileInfo,
    },
}

impl MergeOutcome {
    /// Public path of the merged file (`/uploads/<name>`).
    pub fn public_path(&self) -> Option<&str> {
        match self {
            Self::Merged { file } => Some(file.url.as_str()),
            Self::AlreadyComplete { file } => file.file_path.as_deref(),
        }
    }
}

/// Snapshot of a task and its chunks.
#[derive(Debug, Clone)]
pub struct UploadStatusReport {
    /// The task.
    pub task: UploadTask,
    /// Its chunk records, by index.
    pub chunks: Vec<ChunkRecord>,
}

impl UploadStatusReport {
    /// Number of chunks recorded as uploaded.
    pub fn uploaded_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_uploaded()).count()
    }
}
