//! CLI command definitions and dispatch.

pub mod migrate;
pub mod push;
pub mod serve;
pub mod status;
pub mod sweep;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use quill_core::config::AppConfig;
use quill_core::error::AppError;
use quill_core::traits::storage::StorageProvider;
use quill_database::{DatabasePool, PgFileCatalog, PgUploadLedger};
use quill_storage::LocalStorageProvider;

use crate::output::OutputFormat;

/// Quill: resumable, deduplicating large-file uploads
#[derive(Debug, Parser)]
#[command(name = "quill", version, about, long_about = None)]
pub struct Cli {
    /// Configuration overlay to load from `config/<env>.toml`
    #[arg(short, long, default_value = "development", env = "QUILL_ENV")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the Quill server
    Serve(serve::ServeArgs),
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Run one stale-upload sweep and exit
    Sweep(sweep::SweepArgs),
    /// Show the progress of an upload task
    Status(status::StatusArgs),
    /// Upload a file to a running server
    Push(push::PushArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Serve(args) => serve::execute(args, &self.env).await,
            Commands::Migrate(args) => migrate::execute(args, &self.env, self.format).await,
            Commands::Sweep(args) => sweep::execute(args, &self.env, self.format).await,
            Commands::Status(args) => status::execute(args, &self.env, self.format).await,
            Commands::Push(args) => push::execute(args).await,
        }
    }
}

/// Helper: load configuration for `env`
pub fn load_config(env: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(env)
}

/// Helper: connect to PostgreSQL and build the ledger and catalog.
pub async fn open_database(
    config: &AppConfig,
) -> Result<(DatabasePool, Arc<PgUploadLedger>, Arc<PgFileCatalog>), AppError> {
    let db = DatabasePool::connect(&config.database).await?;
    let ledger = Arc::new(PgUploadLedger::new(db.pool().clone()));
    let catalog = Arc::new(PgFileCatalog::new(db.pool().clone()));
    Ok((db, ledger, catalog))
}

/// Helper: open the uploads root.
pub async fn open_storage(config: &AppConfig) -> Result<Arc<dyn StorageProvider>, AppError> {
    Ok(Arc::new(LocalStorageProvider::new(&config.upload.root).await?))
}
