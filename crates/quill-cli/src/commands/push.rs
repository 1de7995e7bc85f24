//! Reference upload client: hash, verify, upload missing chunks, merge.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use futures::stream::{FuturesUnordered, StreamExt};
use md5::{Digest, Md5};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Semaphore;

use quill_api::dto::{ChunkData, MergeData, MergeBody, VerifyBody, VerifyData};
use quill_core::error::{AppError, ErrorKind};
use quill_core::types::ApiEnvelope;

use crate::output;

const MIB: u64 = 1024 * 1024;

/// Arguments for the push command
#[derive(Debug, Args)]
pub struct PushArgs {
    /// File to upload
    pub file: PathBuf,

    /// Server base URL
    #[arg(short, long, default_value = "http://127.0.0.1:3000", env = "QUILL_SERVER")]
    pub server: String,

    /// Caller token
    #[arg(short, long, env = "QUILL_TOKEN")]
    pub token: String,

    /// Chunk size in MiB
    #[arg(long, default_value_t = 5)]
    pub chunk_mib: u64,

    /// Chunks uploaded in parallel
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Attempts per chunk before giving up
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Name to catalog the file under (defaults to the file's name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Destination folder id
    #[arg(long)]
    pub folder: Option<i64>,

    /// Description
    #[arg(long)]
    pub desc: Option<String>,
}

/// HTTP client for the upload endpoints.
#[derive(Debug, Clone)]
struct UploadClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl UploadClient {
    fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, AppError> {
        let response = req
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::ExternalService, "request failed", e))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let envelope: ApiEnvelope<T> = serde_json::from_str(&body).map_err(|_| {
            AppError::external(format!("unexpected response ({status}): {body}"))
        })?;
        if !envelope.is_ok() {
            return Err(AppError::external(format!(
                "server error {}: {}",
                envelope.code,
                envelope.message.unwrap_or_default()
            )));
        }
        envelope
            .data
            .ok_or_else(|| AppError::external("response carried no data"))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AppError> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    async fn upload_chunk(&self, hash: &str, index: u32, bytes: Vec<u8>) -> Result<ChunkData, AppError> {
        let form = Form::new()
            .text("fileHash", hash.to_string())
            .text("chunkIndex", index.to_string())
            .text("token", self.token.clone())
            .part("chunk", Part::bytes(bytes).file_name(index.to_string()));
        self.send(self.http.post(self.url("/file/chunk")).multipart(form))
            .await
    }
}

/// Execute the push command
pub async fn execute(args: &PushArgs) -> Result<(), AppError> {
    let chunk_size = args.chunk_mib.max(1) * MIB;
    let total_size = tokio::fs::metadata(&args.file).await?.len();
    if total_size == 0 {
        return Err(AppError::validation("refusing to upload an empty file"));
    }
    let file_name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| AppError::validation("cannot derive a file name, pass --name"))?,
    };

    println!("Hashing {}...", args.file.display());
    let hash = md5_file(&args.file).await?;
    output::print_kv("Content hash", &hash);
    output::print_kv("Size", &format!("{total_size} bytes"));

    let client = UploadClient::new(&args.server, &args.token);
    let verify: VerifyData = client
        .post_json(
            "/file/verify",
            &VerifyBody {
                file_hash: hash.clone(),
                file_name: file_name.clone(),
                size: Some(total_size as i64),
                chunk_size: Some(chunk_size as i64),
                subset_id: args.folder,
                file_desc: args.desc.clone(),
                token: Some(args.token.clone()),
            },
        )
        .await?;

    if !verify.should_upload {
        let path = verify.file.and_then(|f| f.file_path).unwrap_or_default();
        output::print_success(&format!("Already uploaded: {path}"));
        return Ok(());
    }

    let chunk_count = verify
        .chunk_count
        .unwrap_or_else(|| total_size.div_ceil(chunk_size) as u32);
    let missing = missing_chunks(chunk_count, verify.uploaded_list.as_deref().unwrap_or_default());
    println!(
        "Uploading {} of {} chunk(s) with concurrency {}...",
        missing.len(),
        chunk_count,
        args.concurrency.max(1)
    );

    upload_missing(&client, &args.file, &hash, &missing, chunk_size, total_size, args).await?;

    println!("Merging...");
    let merged: MergeData = client
        .post_json(
            "/file/merge",
            &MergeBody {
                file_hash: hash,
                file_name,
                size: Some(total_size as i64),
                subset_id: args.folder,
                file_desc: args.desc.clone(),
                token: Some(args.token.clone()),
            },
        )
        .await?;

    match merged {
        MergeData::Merged { url, .. } => output::print_success(&format!("Uploaded: {url}")),
        MergeData::Complete(data) => {
            let path = data.file.and_then(|f| f.file_path).unwrap_or_default();
            output::print_success(&format!("Already uploaded: {path}"));
        }
    }
    Ok(())
}

async fn upload_missing(
    client: &UploadClient,
    file: &Path,
    hash: &str,
    missing: &[u32],
    chunk_size: u64,
    total_size: u64,
    args: &PushArgs,
) -> Result<(), AppError> {
    let semaphore = Arc::new(Semaphore::new(args.concurrency.max(1)));
    let mut tasks = FuturesUnordered::new();

    for &index in missing {
        let client = client.clone();
        let file = file.to_path_buf();
        let hash = hash.to_string();
        let semaphore = Arc::clone(&semaphore);
        let attempts = args.retries.max(1);

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| AppError::internal(format!("upload pool closed: {e}")))?;
            push_chunk(&client, &file, &hash, index, chunk_size, total_size, attempts).await
        }));
    }

    let mut done = 0usize;
    while let Some(joined) = tasks.next().await {
        let index = joined.map_err(|e| AppError::internal(format!("upload task panicked: {e}")))??;
        done += 1;
        tracing::debug!(index, "Chunk uploaded");
        eprint!("\r  {done}/{} chunks", missing.len());
    }
    if !missing.is_empty() {
        eprintln!();
    }
    Ok(())
}

async fn push_chunk(
    client: &UploadClient,
    file: &Path,
    hash: &str,
    index: u32,
    chunk_size: u64,
    total_size: u64,
    attempts: u32,
) -> Result<u32, AppError> {
    let (offset, len) = chunk_range(index, chunk_size, total_size);
    let bytes = read_range(file, offset, len).await?;

    let mut attempt = 1;
    loop {
        match client.upload_chunk(hash, index, bytes.clone()).await {
            Ok(_) => return Ok(index),
            Err(e) if attempt < attempts => {
                tracing::warn!(index, attempt, error = %e, "Chunk upload failed, retrying");
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Lowercase hex MD5 of a file, read in 1 MiB blocks.
pub async fn md5_file(path: &Path) -> Result<String, AppError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; MIB as usize];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Indexes in `0..chunk_count` not listed in `uploaded`.
pub fn missing_chunks(chunk_count: u32, uploaded: &[u32]) -> Vec<u32> {
    let uploaded: BTreeSet<u32> = uploaded.iter().copied().collect();
    (0..chunk_count).filter(|i| !uploaded.contains(i)).collect()
}

/// Byte offset and length of chunk `index`. The last chunk may be short.
pub fn chunk_range(index: u32, chunk_size: u64, total_size: u64) -> (u64, usize) {
    let offset = index as u64 * chunk_size;
    let len = chunk_size.min(total_size.saturating_sub(offset));
    (offset, len as usize)
}

async fn read_range(path: &Path, offset: u64, len: usize) -> Result<Vec<u8>, AppError> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(std::io::SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_chunks() {
        assert_eq!(missing_chunks(6, &[0, 2, 5]), vec![1, 3, 4]);
        assert_eq!(missing_chunks(3, &[]), vec![0, 1, 2]);
        assert!(missing_chunks(2, &[1, 0]).is_empty());
    }

    #[test]
    fn test_chunk_range_short_tail() {
        let total = 5 * MIB / 2;
        assert_eq!(chunk_range(0, MIB, total), (0, MIB as usize));
        assert_eq!(chunk_range(2, MIB, total), (2 * MIB, (MIB / 2) as usize));
    }

    #[tokio::test]
    async fn test_md5_file_and_read_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"hello world").unwrap();

        assert_eq!(
            md5_file(&path).await.unwrap(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(read_range(&path, 6, 5).await.unwrap(), b"world");
    }
}
