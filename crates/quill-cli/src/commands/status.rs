//! Upload task progress.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use quill_core::error::{AppError, UploadError};
use quill_entity::upload::ChunkRecord;
use quill_service::{UploadService, UploadStatusReport};

use crate::output::{self, OutputFormat};

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Content hash of the upload
    pub hash: String,

    /// Only list chunks that are still pending
    #[arg(long)]
    pub pending: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct ChunkRow {
    #[tabled(rename = "Index")]
    index: i32,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Bytes")]
    size_bytes: String,
    #[tabled(rename = "Path")]
    storage_path: String,
}

impl From<&ChunkRecord> for ChunkRow {
    fn from(record: &ChunkRecord) -> Self {
        Self {
            index: record.chunk_index,
            status: record.status.to_string(),
            size_bytes: record
                .size_bytes
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            storage_path: record.storage_path.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Execute the status command
pub async fn execute(args: &StatusArgs, env: &str, format: OutputFormat) -> Result<(), AppError> {
    let config = super::load_config(env)?;
    let (db, ledger, catalog) = super::open_database(&config).await?;
    let storage = super::open_storage(&config).await?;
    let service = UploadService::new(ledger, catalog, storage, config.upload.clone());

    let report = service.status(&args.hash).await;
    db.close().await;
    let report = report.map_err(|e| match e {
        UploadError::Internal(inner) => inner,
        UploadError::InvalidRequest(msg) => AppError::validation(msg),
        other => AppError::not_found(other.to_string()),
    })?;

    if format == OutputFormat::Json {
        output::print_json(&serde_json::json!({
            "task": report.task,
            "chunks": report.chunks,
        }));
        return Ok(());
    }

    print_summary(&report);
    let rows: Vec<ChunkRow> = report
        .chunks
        .iter()
        .filter(|c| !args.pending || !c.is_uploaded())
        .map(ChunkRow::from)
        .collect();
    output::print_list(&rows, format);
    Ok(())
}

fn print_summary(report: &UploadStatusReport) {
    let task = &report.task;
    println!("Upload {}", task.content_hash);
    output::print_kv("File", &task.file_name);
    output::print_kv("Status", task.status.as_str());
    output::print_kv("Size", &format!("{} bytes", task.total_size));
    output::print_kv(
        "Chunks",
        &format!("{}/{} uploaded", report.uploaded_count(), task.chunk_count),
    );
    if let Some(path) = &task.final_path {
        output::print_kv("Path", path);
    }
    output::print_kv("Updated", &task.updated_at.to_rfc3339());
    println!();
}
