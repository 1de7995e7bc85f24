//! Chunk record entity: one row per chunk of an upload task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Whether a chunk's bytes have landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "chunk_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    /// Created by verify, no bytes yet.
    Pending,
    /// Stored durably at `storage_path`.
    Uploaded,
}

impl ChunkStatus {
    /// Return the status as a string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploaded => "uploaded",
        }
    }
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A `file_chunks` row, identified by `(content_hash, chunk_index)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChunkRecord {
    /// Owning task's content hash.
    pub content_hash: String,
    /// Zero-based chunk index.
    pub chunk_index: i32,
    /// `<content_hash>-<index>`, unique across all tasks.
    pub chunk_hash: String,
    /// Bytes received, set once uploaded.
    pub size_bytes: Option<i64>,
    /// Path relative to the uploads root, set once uploaded.
    pub storage_path: Option<String>,
    /// Upload state.
    pub status: ChunkStatus,
    /// When the record was initialized.
    pub created_at: DateTime<Utc>,
}

impl ChunkRecord {
    /// A fresh pending record.
    pub fn pending(content_hash: &str, chunk_index: i32) -> Self {
        Self {
            content_hash: content_hash.to_string(),
            chunk_index,
            chunk_hash: chunk_hash(content_hash, chunk_index),
            size_bytes: None,
            storage_path: None,
            status: ChunkStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Whether the chunk is stored.
    pub fn is_uploaded(&self) -> bool {
        self.status == ChunkStatus::Uploaded
    }
}

/// Per-chunk identifier. Index, not content, is the chunk's identity.
pub fn chunk_hash(content_hash: &str, chunk_index: i32) -> String {
    format!("{content_hash}-{chunk_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_record() {
        let record = ChunkRecord::pending("d41d8cd98f00b204e9800998ecf8427e", 4);
        assert_eq!(record.chunk_hash, "d41d8cd98f00b204e9800998ecf8427e-4");
        assert!(!record.is_uploaded());
        assert!(record.storage_path.is_none());
    }
}
