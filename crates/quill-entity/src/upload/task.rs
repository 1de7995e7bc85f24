//! Upload task entity: one row per distinct content hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Lifecycle state of an upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "upload_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Chunks are being received.
    InProgress,
    /// Merged; the task is the dedup answer for its hash.
    Completed,
    /// Abandoned or rejected. The next verify restarts it.
    Failed,
}

impl UploadStatus {
    /// Return the status as a string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chunked upload task (`large_files` row).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UploadTask {
    /// Row identifier.
    pub id: i64,
    /// Client-computed hash of the whole file. Unique.
    pub content_hash: String,
    /// Original file name as supplied by the client.
    pub file_name: String,
    /// Extension including the leading dot, or empty.
    pub file_extension: String,
    /// Total file size in bytes.
    pub total_size: i64,
    /// Chunk size in bytes (the last chunk may be shorter).
    pub chunk_size: i64,
    /// Number of chunks, `ceil(total_size / chunk_size)`.
    pub chunk_count: i32,
    /// Current status.
    pub status: UploadStatus,
    /// Public path of the merged file, set on completion.
    pub final_path: Option<String>,
    /// Destination folder in the file catalog.
    pub folder_id: Option<i64>,
    /// Description passed through to the catalog.
    pub description: Option<String>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task last changed state.
    pub updated_at: DateTime<Utc>,
}

impl UploadTask {
    /// Whether the task has been merged.
    pub fn is_completed(&self) -> bool {
        self.status == UploadStatus::Completed
    }

    /// Whether the task is accepting chunks.
    pub fn is_in_progress(&self) -> bool {
        self.status == UploadStatus::InProgress
    }
}

/// Data required to create a new upload task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUploadTask {
    /// Content hash.
    pub content_hash: String,
    /// File name.
    pub file_name: String,
    /// Extension including the leading dot.
    pub file_extension: String,
    /// Total size in bytes.
    pub total_size: i64,
    /// Chunk size in bytes.
    pub chunk_size: i64,
    /// Number of chunks.
    pub chunk_count: i32,
    /// Destination folder.
    pub folder_id: Option<i64>,
    /// Description.
    pub description: Option<String>,
}

impl NewUploadTask {
    /// Build a task payload, deriving the chunk count and extension.
    ///
    /// `total_size` and `chunk_size` must both be positive.
    pub fn new(
        content_hash: impl Into<String>,
        file_name: impl Into<String>,
        total_size: i64,
        chunk_size: i64,
        folder_id: Option<i64>,
        description: Option<String>,
    ) -> Self {
        let file_name = file_name.into();
        Self {
            content_hash: content_hash.into(),
            file_extension: extension_of(&file_name),
            file_name,
            total_size,
            chunk_size,
            chunk_count: chunk_count(total_size, chunk_size),
            folder_id,
            description,
        }
    }
}

/// `ceil(total_size / chunk_size)`.
pub fn chunk_count(total_size: i64, chunk_size: i64) -> i32 {
    ((total_size + chunk_size - 1) / chunk_size) as i32
}

/// Longest extension kept, dot excluded.
const MAX_EXTENSION_LEN: usize = 16;

/// Extension of a file name including the dot (`"movie.mp4"` -> `".mp4"`).
///
/// Only the last path component counts, with `/` and `\` both treated as
/// separators. Names without a dot, whose only dot is leading, or whose
/// extension is not short ASCII alphanumeric have no extension.
pub fn extension_of(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let ext = match base.rfind('.') {
        Some(pos) if pos > 0 => &base[pos + 1..],
        _ => return String::new(),
    };
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return String::new();
    }
    format!(".{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_count_rounds_up() {
        assert_eq!(chunk_count(2_621_440, 1_048_576), 3);
        assert_eq!(chunk_count(2_097_152, 1_048_576), 2);
        assert_eq!(chunk_count(1, 1_048_576), 1);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("movie.final.mp4"), ".mp4");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(".bashrc"), "");
    }

    #[test]
    fn test_extension_of_ignores_directories_and_junk() {
        assert_eq!(extension_of("x.y/../evil"), "");
        assert_eq!(extension_of("dir.v2/clip.mp4"), ".mp4");
        assert_eq!(extension_of("C:\\media.d\\clip.mkv"), ".mkv");
        assert_eq!(extension_of("a.b\\..\\evil"), "");
        assert_eq!(extension_of("movie.mp4?raw=1"), "");
        assert_eq!(extension_of("movie.mp4#frag"), "");
        assert_eq!(extension_of("trailing."), "");
        assert_eq!(extension_of("a.abcdefghijklmnopq"), "");
    }

    #[test]
    fn test_new_task_never_derives_path_from_name() {
        let task = NewUploadTask::new("abc", "x.y/../evil", 10, 10, None, None);
        assert_eq!(task.file_extension, "");
        assert_eq!(task.file_name, "x.y/../evil");
    }

    #[test]
    fn test_new_task_derives_fields() {
        let task = NewUploadTask::new("abc", "clip.mov", 2_621_440, 1_048_576, Some(7), None);
        assert_eq!(task.chunk_count, 3);
        assert_eq!(task.file_extension, ".mov");
        assert_eq!(task.folder_id, Some(7));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&UploadStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(UploadStatus::Completed.to_string(), "completed");
    }
}
