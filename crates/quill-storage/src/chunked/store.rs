//! Durable, addressable storage for in-flight chunk blobs.
//!
//! Layout: `chunks/<content_hash>/<chunk_index>` relative to the uploads root.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, warn};

use quill_core::error::{AppError, ErrorKind, UploadError};
use quill_core::result::{AppResult, UploadResult};
use quill_core::traits::storage::{ByteStream, StorageProvider};

/// Directory under the uploads root that holds per-task chunk directories.
pub const CHUNKS_DIR: &str = "chunks";

/// Suffix of in-flight chunk writes.
pub const PART_SUFFIX: &str = ".part";

/// Concatenated chunk bytes in index order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = UploadResult<Bytes>> + Send>>;

/// Where one chunk lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLocation {
    /// Chunk index.
    pub index: u32,
    /// Path relative to the uploads root.
    pub path: String,
}

/// Filesystem-backed chunk storage keyed by content hash and index.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    provider: Arc<dyn StorageProvider>,
}

impl ChunkStore {
    /// Create a chunk store on top of the uploads provider.
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// The underlying provider.
    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }

    /// Directory holding every chunk of `hash`.
    pub fn chunk_dir(hash: &str) -> String {
        format!("{CHUNKS_DIR}/{hash}")
    }

    /// Path of chunk `index` of `hash`.
    pub fn chunk_path(hash: &str, index: u32) -> String {
        format!("{CHUNKS_DIR}/{hash}/{index}")
    }

    /// Durably store one chunk and return its storage path.
    ///
    /// Bytes go to a uniquely named `.part` file that is synced and then
    /// renamed into place, so a concurrent duplicate upload or a crash never
    /// leaves a truncated file at the final path. Overwriting an existing
    /// chunk is allowed.
    pub async fn put_chunk(&self, hash: &str, index: u32, data: Bytes) -> AppResult<String> {
        let path = Self::chunk_path(hash, index);
        let part = format!("{path}.{:08x}{PART_SUFFIX}", rand::random::<u32>());
        let size = data.len();

        if let Err(e) = self.provider.write(&part, data).await {
            self.discard(&part).await;
            return Err(e);
        }
        if let Err(e) = self.provider.rename(&part, &path).await {
            self.discard(&part).await;
            return Err(e);
        }

        debug!(hash, index, bytes = size, "Stored chunk");
        Ok(path)
    }

    async fn discard(&self, part: &str) {
        if let Err(e) = self.provider.delete(part).await {
            warn!(path = part, error = %e, "Failed to remove partial chunk");
        }
    }

    /// Stream the given chunks back-to-back in the order supplied.
    ///
    /// Each chunk is opened only when the previous one is exhausted. A chunk
    /// absent from storage yields [`UploadError::ChunkMissing`].
    pub fn read_chunks_in_order(&self, chunks: Vec<ChunkLocation>) -> ChunkStream {
        struct ReadState {
            provider: Arc<dyn StorageProvider>,
            pending: VecDeque<ChunkLocation>,
            current: Option<(u32, ByteStream)>,
        }

        let state = ReadState {
            provider: Arc::clone(&self.provider),
            pending: chunks.into(),
            current: None,
        };

        let stream = stream::try_unfold(state, |mut st| async move {
            loop {
                if let Some((index, reader)) = st.current.as_mut() {
                    let index = *index;
                    match reader.next().await {
                        Some(Ok(bytes)) => return Ok(Some((bytes, st))),
                        Some(Err(e)) => {
                            return Err(UploadError::Internal(AppError::with_source(
                                ErrorKind::Storage,
                                format!("Failed to read chunk {index}"),
                                e,
                            )));
                        }
                        None => st.current = None,
                    }
                    continue;
                }

                let Some(next) = st.pending.pop_front() else {
                    return Ok(None);
                };
                let reader = match st.provider.read(&next.path).await {
                    Ok(reader) => reader,
                    Err(e) if e.is_not_found() => {
                        return Err(UploadError::ChunkMissing {
                            index: next.index,
                            path: next.path.clone(),
                        });
                    }
                    Err(e) => return Err(UploadError::Internal(e)),
                };
                st.current = Some((next.index, reader));
            }
        });

        Box::pin(stream)
    }

    /// Remove every chunk of `hash`. Failures are logged, not returned.
    ///
    /// Returns whether the directory is gone.
    pub async fn delete_task_chunks(&self, hash: &str) -> bool {
        match self.provider.delete_dir(&Self::chunk_dir(hash)).await {
            Ok(()) => {
                debug!(hash, "Removed chunk directory");
                true
            }
            Err(e) => {
                warn!(hash, error = %e, "Failed to remove chunk directory");
                false
            }
        }
    }
}

/// Whether `hash` is usable as a chunk directory name.
pub fn is_valid_content_hash(hash: &str) -> bool {
    !hash.is_empty()
        && hash.len() <= 128
        && hash
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::LocalStorageProvider;
    use futures::TryStreamExt;

    async fn store() -> (tempfile::TempDir, ChunkStore) {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path()).await.unwrap();
        (dir, ChunkStore::new(Arc::new(provider)))
    }

    fn locations(hash: &str, indexes: &[u32]) -> Vec<ChunkLocation> {
        indexes
            .iter()
            .map(|&index| ChunkLocation {
                index,
                path: ChunkStore::chunk_path(hash, index),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_put_chunk_leaves_no_part_files() {
        let (dir, store) = store().await;

        let path = store.put_chunk("abc", 3, Bytes::from("xyz")).await.unwrap();
        assert_eq!(path, "chunks/abc/3");

        let names: Vec<String> = std::fs::read_dir(dir.path().join("chunks/abc"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["3".to_string()]);
    }

    #[tokio::test]
    async fn test_put_chunk_overwrites() {
        let (dir, store) = store().await;
        store.put_chunk("abc", 0, Bytes::from("first")).await.unwrap();
        store.put_chunk("abc", 0, Bytes::from("second")).await.unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("chunks/abc/0")).unwrap(),
            b"second"
        );
    }

    #[tokio::test]
    async fn test_read_in_index_order_regardless_of_write_order() {
        let (_dir, store) = store().await;
        for (index, body) in [(2, "cc"), (0, "aa"), (1, "bb")] {
            store.put_chunk("abc", index, Bytes::from(body)).await.unwrap();
        }

        let parts: Vec<Bytes> = store
            .read_chunks_in_order(locations("abc", &[0, 1, 2]))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(parts.concat(), b"aabbcc");
    }

    #[tokio::test]
    async fn test_missing_chunk_reported_with_index() {
        let (_dir, store) = store().await;
        store.put_chunk("abc", 0, Bytes::from("aa")).await.unwrap();

        let err = store
            .read_chunks_in_order(locations("abc", &[0, 1]))
            .try_collect::<Vec<Bytes>>()
            .await
            .unwrap_err();
        match err {
            UploadError::ChunkMissing { index, path } => {
                assert_eq!(index, 1);
                assert_eq!(path, "chunks/abc/1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_delete_task_chunks() {
        let (dir, store) = store().await;
        store.put_chunk("abc", 0, Bytes::from("aa")).await.unwrap();
        store.put_chunk("def", 0, Bytes::from("dd")).await.unwrap();

        assert!(store.delete_task_chunks("abc").await);
        assert!(!dir.path().join("chunks/abc").exists());
        assert!(dir.path().join("chunks/def/0").exists());
        // already gone
        assert!(store.delete_task_chunks("abc").await);
    }

    #[test]
    fn test_content_hash_validation() {
        assert!(is_valid_content_hash("d41d8cd98f00b204e9800998ecf8427e"));
        assert!(is_valid_content_hash("sha256-abc_01"));
        assert!(!is_valid_content_hash(""));
        assert!(!is_valid_content_hash("../etc"));
        assert!(!is_valid_content_hash("a/b"));
    }
}
