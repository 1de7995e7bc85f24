//! Chunk assembler: ordered reassembly of chunks into a final file.

use std::time::{SystemTime, UNIX_EPOCH};

use futures::TryStreamExt;
use md5::{Digest, Md5};
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use quill_core::error::{AppError, ErrorKind, UploadError};
use quill_core::result::UploadResult;

use super::store::{ChunkLocation, ChunkStore};

/// A merged file written to the uploads root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFile {
    /// File name relative to the uploads root.
    pub file_name: String,
    /// Bytes written.
    pub size_bytes: u64,
    /// Lowercase hex MD5 of the written bytes.
    pub md5_hex: String,
}

/// Concatenates stored chunks, in index order, into a freshly named file.
#[derive(Debug, Clone)]
pub struct ChunkAssembler {
    store: ChunkStore,
}

impl ChunkAssembler {
    /// Create an assembler reading from `store`.
    pub fn new(store: ChunkStore) -> Self {
        Self { store }
    }

    /// `file-<unix millis>-<random 0..1e9><extension>`.
    ///
    /// The client's file name is never used on disk, and an extension that
    /// is not `.` followed by ASCII alphanumerics is dropped.
    pub fn output_name(extension: &str) -> String {
        let extension = match extension.strip_prefix('.') {
            Some(ext) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
                extension
            }
            _ => "",
        };
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
        format!("file-{millis}-{suffix}{extension}")
    }

    /// Write `chunks` sequentially into a new file.
    ///
    /// `chunks` is sorted by index before writing. If any chunk cannot be
    /// read the partial output is deleted and the error is returned.
    pub async fn assemble(
        &self,
        mut chunks: Vec<ChunkLocation>,
        extension: &str,
    ) -> UploadResult<AssembledFile> {
        chunks.sort_by_key(|c| c.index);
        let file_name = Self::output_name(extension);
        let chunk_count = chunks.len();

        match self.write_output(&file_name, chunks).await {
            Ok((size_bytes, md5_hex)) => {
                info!(
                    file_name = %file_name,
                    chunks = chunk_count,
                    bytes = size_bytes,
                    "Chunks assembled"
                );
                Ok(AssembledFile {
                    file_name,
                    size_bytes,
                    md5_hex,
                })
            }
            Err(e) => {
                self.discard(&file_name).await;
                Err(e)
            }
        }
    }

    /// Remove an assembled (or partially assembled) output file.
    pub async fn discard(&self, file_name: &str) {
        if let Err(e) = self.store.provider().delete(file_name).await {
            warn!(file_name, error = %e, "Failed to remove merge output");
        }
    }

    async fn write_output(
        &self,
        file_name: &str,
        chunks: Vec<ChunkLocation>,
    ) -> UploadResult<(u64, String)> {
        let write_err = |e: std::io::Error| {
            UploadError::Internal(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to write merge output {file_name}"),
                e,
            ))
        };

        let mut writer = self.store.provider().create_writer(file_name).await?;
        let mut input = self.store.read_chunks_in_order(chunks);
        let mut hasher = Md5::new();
        let mut written = 0u64;

        while let Some(bytes) = input.try_next().await? {
            hasher.update(&bytes);
            writer.write_all(&bytes).await.map_err(write_err)?;
            written += bytes.len() as u64;
        }

        writer.flush().await.map_err(write_err)?;
        writer.shutdown().await.map_err(write_err)?;
        drop(writer);
        self.store.provider().sync(file_name).await?;

        Ok((written, format!("{:x}", hasher.finalize())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::providers::LocalStorageProvider;

    async fn setup() -> (tempfile::TempDir, ChunkStore, ChunkAssembler) {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path()).await.unwrap();
        let store = ChunkStore::new(Arc::new(provider));
        let assembler = ChunkAssembler::new(store.clone());
        (dir, store, assembler)
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

    #[test]
    fn test_output_name_shape() {
        let name = ChunkAssembler::output_name(".mp4");
        assert!(name.starts_with("file-"));
        assert!(name.ends_with(".mp4"));
        assert_eq!(name.matches('-').count(), 2);

        let bare = ChunkAssembler::output_name("");
        assert!(!bare.contains('.'));
    }

    #[test]
    fn test_output_name_drops_unsafe_extension() {
        for ext in ["./evil", ".a/b", ".x\\y", ".mp4?x", "mp4"] {
            let name = ChunkAssembler::output_name(ext);
            assert!(!name.contains(['/', '\\', '.', '?']), "{ext} -> {name}");
        }
    }

    #[tokio::test]
    async fn test_assemble_sorts_by_index() {
        let (dir, store, assembler) = setup().await;
        let original: Vec<u8> = (0..=255u8).cycle().take(6 * 1000).collect();
        for (index, part) in original.chunks(1000).enumerate().rev() {
            store
                .put_chunk("h", index as u32, Bytes::copy_from_slice(part))
                .await
                .unwrap();
        }

        let out = assembler
            .assemble(locations("h", &[5, 4, 3, 2, 1, 0]), ".bin")
            .await
            .unwrap();

        assert_eq!(out.size_bytes, 6000);
        assert_eq!(std::fs::read(dir.path().join(&out.file_name)).unwrap(), original);
        assert_eq!(out.md5_hex, format!("{:x}", Md5::digest(&original)));
    }

    #[tokio::test]
    async fn test_missing_chunk_removes_partial_output() {
        let (dir, store, assembler) = setup().await;
        store.put_chunk("h", 0, Bytes::from("aaaa")).await.unwrap();

        let err = assembler
            .assemble(locations("h", &[0, 1]), ".txt")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::ChunkMissing { index: 1, .. }));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("file-"))
            .collect();
        assert!(leftovers.is_empty(), "partial output left: {leftovers:?}");
    }
}
