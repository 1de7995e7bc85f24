//! Storage provider trait for the uploads filesystem.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use tokio::io::AsyncWrite;

use crate::result::AppResult;

/// Metadata about a stored object.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StorageObjectMeta {
    /// Path within the storage provider.
    pub path: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modified timestamp.
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
    /// Whether this is a directory.
    pub is_directory: bool,
}

/// A byte stream type used for reading file contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// A sequential writer for streaming output into a stored file.
pub type ByteSink = Pin<Box<dyn AsyncWrite + Send>>;

/// Trait for file storage backends.
///
/// All paths are relative to the provider root and use `/` separators.
#[async_trait]
pub trait StorageProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local").
    fn provider_type(&self) -> &str;

    /// Check whether the provider is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Read a file and return its byte stream.
    ///
    /// A missing file yields an error of kind `NotFound`.
    async fn read(&self, path: &str) -> AppResult<ByteStream>;

    /// Write bytes to a file, creating parent directories.
    ///
    /// The data is flushed to stable storage before this returns.
    async fn write(&self, path: &str, data: Bytes) -> AppResult<()>;

    /// Create (or truncate) a file and return a writer for it.
    async fn create_writer(&self, path: &str) -> AppResult<ByteSink>;

    /// Flush a file's contents to stable storage.
    async fn sync(&self, path: &str) -> AppResult<()>;

    /// Delete a file. Deleting a missing file is not an error.
    async fn delete(&self, path: &str) -> AppResult<()>;

    /// Delete a directory and all its contents recursively.
    async fn delete_dir(&self, path: &str) -> AppResult<()>;

    /// Move (rename) a file within this provider.
    async fn rename(&self, from: &str, to: &str) -> AppResult<()>;

    /// Check whether a file or directory exists at the given path.
    async fn exists(&self, path: &str) -> AppResult<bool>;

    /// Get metadata about a file or directory.
    async fn metadata(&self, path: &str) -> AppResult<StorageObjectMeta>;

    /// List the contents of a directory. A missing directory lists as empty.
    async fn list(&self, path: &str) -> AppResult<Vec<StorageObjectMeta>>;

    /// Create a directory (and any missing parents).
    async fn create_dir(&self, path: &str) -> AppResult<()>;
}
