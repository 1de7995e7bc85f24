//! Database migration management commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use quill_core::error::AppError;
use quill_database::DatabasePool;
use quill_database::migration::{migration_status, run_migrations};

use crate::output::{self, OutputFormat};

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run,
    /// Show migration status
    Status,
}

#[derive(Debug, Serialize, Tabled)]
struct MigrationRow {
    #[tabled(rename = "Version")]
    version: i64,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Applied")]
    applied: bool,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, env: &str, format: OutputFormat) -> Result<(), AppError> {
    let mut config = super::load_config(env)?;
    config.database.run_migrations = false;
    let db = DatabasePool::connect(&config.database).await?;

    match &args.command {
        MigrateCommand::Run => {
            println!("Running database migrations...");
            run_migrations(db.pool()).await?;
            output::print_success("All migrations applied successfully.");
        }
        MigrateCommand::Status => {
            let rows: Vec<MigrationRow> = migration_status(db.pool())
                .await?
                .into_iter()
                .map(|m| MigrationRow {
                    version: m.version,
                    description: m.description,
                    applied: m.applied,
                })
                .collect();
            let pending = rows.iter().filter(|r| !r.applied).count();
            output::print_list(&rows, format);
            if pending > 0 {
                output::print_warning(&format!("{pending} migration(s) pending"));
            }
        }
    }

    db.close().await;
    Ok(())
}
