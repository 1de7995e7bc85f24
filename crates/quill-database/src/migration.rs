//! Embedded schema migrations.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

use quill_core::error::{AppError, ErrorKind};

/// Migrations under the workspace `migrations/` directory, embedded at build time.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Apply all pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!(
        available = MIGRATOR.iter().count(),
        "Applying database migrations"
    );

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to run migrations: {e}"),
            e,
        )
    })?;

    info!("Database schema is up to date");
    Ok(())
}

/// Whether one embedded migration has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Migration version (timestamp prefix of the file name).
    pub version: i64,
    /// Description from the file name.
    pub description: String,
    /// Whether the database records it as successfully applied.
    pub applied: bool,
}

/// Compare the embedded migrations with the `_sqlx_migrations` table.
pub async fn migration_status(pool: &PgPool) -> Result<Vec<MigrationStatus>, AppError> {
    let applied: Vec<i64> =
        match sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(pool)
            .await
        {
            Ok(versions) => versions,
            // undefined_table: nothing applied yet
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("42P01") => Vec::new(),
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Database,
                    "Failed to read applied migrations",
                    e,
                ));
            }
        };

    Ok(MIGRATOR
        .iter()
        .map(|m| MigrationStatus {
            version: m.version,
            description: m.description.to_string(),
            applied: applied.contains(&m.version),
        })
        .collect())
}
