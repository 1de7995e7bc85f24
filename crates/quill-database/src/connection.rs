//! PostgreSQL connection pool management.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use quill_core::config::database::DatabaseConfig;
use quill_core::error::{AppError, ErrorKind};

use crate::migration;

/// Shared PostgreSQL pool backing the ledger and the file catalog.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Open a pool and, when `run_migrations` is set, bring the schema up to date.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            url = %redact_url(&config.url),
            max_connections = config.max_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to connect to database: {e}"),
                    e,
                )
            })?;

        let db = Self { pool };
        if config.run_migrations {
            migration::run_migrations(&db.pool).await?;
        }
        Ok(db)
    }

    /// The underlying sqlx pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

/// Replace the password in a connection URL with `****`.
fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|p| p + 3) else {
        return url.to_string();
    };
    let Some(at) = url[scheme_end..].find('@').map(|p| p + scheme_end) else {
        return url.to_string();
    };
    match url[scheme_end..at].find(':') {
        Some(colon) => format!("{}:****{}", &url[..scheme_end + colon], &url[at..]),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("postgres://quill:hunter2@db:5432/quill"),
            "postgres://quill:****@db:5432/quill"
        );
        assert_eq!(
            redact_url("postgres://quill@db:5432/quill"),
            "postgres://quill@db:5432/quill"
        );
        assert_eq!(redact_url("postgres://db/quill"), "postgres://db/quill");
    }
}
