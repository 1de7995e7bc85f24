//! Local filesystem storage provider rooted at the uploads directory.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use quill_core::error::{AppError, ErrorKind};
use quill_core::result::AppResult;
use quill_core::traits::storage::{ByteSink, ByteStream, StorageObjectMeta, StorageProvider};

/// Local filesystem storage provider.
#[derive(Debug, Clone)]
pub struct LocalStorageProvider {
    /// Root directory for all stored files.
    root: PathBuf,
}

impl LocalStorageProvider {
    /// Create a provider rooted at `root_path`, creating the directory if needed.
    pub async fn new(root_path: impl AsRef<Path>) -> AppResult<Self> {
        let root = root_path.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// The provider's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path inside the root. Parent-directory segments are rejected.
    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let clean = Path::new(path.trim_start_matches('/'));
        if clean
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(AppError::validation(format!(
                "Path escapes storage root: {path}"
            )));
        }
        Ok(self.root.join(clean))
    }

    /// Ensure the parent directory of a path exists.
    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

fn storage_err(action: &str, path: &str, e: std::io::Error) -> AppError {
    if e.kind() == std::io::ErrorKind::NotFound {
        AppError::not_found(format!("Not found: {path}"))
    } else {
        AppError::with_source(ErrorKind::Storage, format!("Failed to {action}: {path}"), e)
    }
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn health_check(&self) -> AppResult<bool> {
        match fs::metadata(&self.root).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(_) => Ok(false),
        }
    }

    async fn read(&self, path: &str) -> AppResult<ByteStream> {
        let full_path = self.resolve(path)?;
        let file = fs::File::open(&full_path)
            .await
            .map_err(|e| storage_err("open file", path, e))?;

        let stream = ReaderStream::new(file);
        Ok(Box::pin(stream.map(|r| r.map(Bytes::from))))
    }

    async fn write(&self, path: &str, data: Bytes) -> AppResult<()> {
        let full_path = self.resolve(path)?;
        self.ensure_parent(&full_path).await?;

        let mut file = fs::File::create(&full_path)
            .await
            .map_err(|e| storage_err("create file", path, e))?;
        file.write_all(&data)
            .await
            .map_err(|e| storage_err("write file", path, e))?;
        file.flush()
            .await
            .map_err(|e| storage_err("flush file", path, e))?;
        file.sync_all()
            .await
            .map_err(|e| storage_err("sync file", path, e))?;

        debug!(path, bytes = data.len(), "Wrote file");
        Ok(())
    }

    async fn create_writer(&self, path: &str) -> AppResult<ByteSink> {
        let full_path = self.resolve(path)?;
        self.ensure_parent(&full_path).await?;

        let file = fs::File::create(&full_path)
            .await
            .map_err(|e| storage_err("create file", path, e))?;
        Ok(Box::pin(file))
    }

    async fn sync(&self, path: &str) -> AppResult<()> {
        let full_path = self.resolve(path)?;
        let file = fs::File::open(&full_path)
            .await
            .map_err(|e| storage_err("open file", path, e))?;
        file.sync_all()
            .await
            .map_err(|e| storage_err("sync file", path, e))?;
        debug!(path, "Synced file");
        Ok(())
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        let full_path = self.resolve(path)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err("delete file", path, e)),
        }
    }

    async fn delete_dir(&self, path: &str) -> AppResult<()> {
        let full_path = self.resolve(path)?;
        match fs::remove_dir_all(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err("delete directory", path, e)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> AppResult<()> {
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;
        self.ensure_parent(&to_path).await?;

        fs::rename(&from_path, &to_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to rename {from} -> {to}"),
                e,
            )
        })
    }

    async fn exists(&self, path: &str) -> AppResult<bool> {
        let full_path = self.resolve(path)?;
        fs::try_exists(&full_path)
            .await
            .map_err(|e| storage_err("stat", path, e))
    }

    async fn metadata(&self, path: &str) -> AppResult<StorageObjectMeta> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path)
            .await
            .map_err(|e| storage_err("get metadata", path, e))?;

        Ok(StorageObjectMeta {
            path: path.to_string(),
            size_bytes: meta.len(),
            last_modified: meta.modified().ok().map(chrono::DateTime::<chrono::Utc>::from),
            is_directory: meta.is_dir(),
        })
    }

    async fn list(&self, path: &str) -> AppResult<Vec<StorageObjectMeta>> {
        let full_path = self.resolve(path)?;
        let mut dir = match fs::read_dir(&full_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_err("list directory", path, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to read directory entry", e)
        })? {
            let entry_meta = entry.metadata().await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to get entry metadata", e)
            })?;

            let name = entry.file_name().to_string_lossy().to_string();
            let entry_path = if path.is_empty() || path == "/" {
                name
            } else {
                format!("{}/{}", path.trim_end_matches('/'), name)
            };

            entries.push(StorageObjectMeta {
                path: entry_path,
                size_bytes: entry_meta.len(),
                last_modified: entry_meta
                    .modified()
                    .ok()
                    .map(chrono::DateTime::<chrono::Utc>::from),
                is_directory: entry_meta.is_dir(),
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn create_dir(&self, path: &str) -> AppResult<()> {
        let full_path = self.resolve(path)?;
        fs::create_dir_all(&full_path)
            .await
            .map_err(|e| storage_err("create directory", path, e))
    }
}
