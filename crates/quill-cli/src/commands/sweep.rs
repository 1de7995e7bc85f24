//! One-shot stale upload sweep.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use quill_core::error::AppError;
use quill_service::StaleUploadSweeper;
use quill_storage::chunked::ChunkStore;

use crate::output::{self, OutputFormat};

/// Arguments for the sweep command
#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Override `upload.stale_after_hours`
    #[arg(long)]
    pub older_than_hours: Option<u64>,
}

#[derive(Debug, Serialize, Tabled)]
struct SweepRow {
    #[tabled(rename = "Stale tasks")]
    stale_tasks: usize,
    #[tabled(rename = "Orphan dirs")]
    orphan_dirs: usize,
    #[tabled(rename = "Part files")]
    part_files: usize,
}

/// Execute the sweep command
pub async fn execute(args: &SweepArgs, env: &str, format: OutputFormat) -> Result<(), AppError> {
    let mut config = super::load_config(env)?;
    if let Some(hours) = args.older_than_hours {
        config.upload.stale_after_hours = hours;
    }

    let (db, ledger, _) = super::open_database(&config).await?;
    let storage = super::open_storage(&config).await?;
    let sweeper = StaleUploadSweeper::new(ledger, ChunkStore::new(storage), config.upload.stale_after());

    let report = sweeper.sweep(chrono::Utc::now()).await;
    db.close().await;
    let report = report?;

    output::print_list(
        &[SweepRow {
            stale_tasks: report.stale_tasks,
            orphan_dirs: report.orphan_dirs,
            part_files: report.part_files,
        }],
        format,
    );
    if report.is_empty() {
        output::print_success("Nothing to reclaim.");
    }
    Ok(())
}
