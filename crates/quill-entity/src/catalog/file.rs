//! Catalog file entity: the externally visible entry for a merged upload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A `files` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CatalogFile {
    /// Row identifier.
    pub id: i64,
    /// Display name (the client's original file name).
    pub file_name: String,
    /// Public path, e.g. `/uploads/file-1700000000000-123456789.mp4`.
    pub url: String,
    /// Extension without the dot.
    pub format: String,
    /// Containing folder.
    pub folder_id: Option<i64>,
    /// Size in bytes.
    pub size_bytes: i64,
    /// Free-form description.
    pub description: Option<String>,
    /// Content hash of the upload that produced this entry.
    pub content_hash: Option<String>,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

/// Data required to insert a catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCatalogFile {
    /// Display name.
    pub file_name: String,
    /// Public path.
    pub url: String,
    /// Extension without the dot.
    pub format: String,
    /// Containing folder.
    pub folder_id: Option<i64>,
    /// Size in bytes.
    pub size_bytes: i64,
    /// Description.
    pub description: Option<String>,
    /// Originating content hash.
    pub content_hash: Option<String>,
}
