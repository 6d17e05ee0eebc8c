//! Connection pool construction.
//!
//! Foreign keys are always enabled: cascading deletes are declared in the
//! schema and rely on SQLite enforcing them.

use std::str::FromStr;
use std::time::Duration;

use outlet_kernel::settings::DatabaseSettings;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
    ConnectOptions,
};

use crate::DbError;

/// Open a pool against the database described by `settings`, creating the
/// file if it does not exist yet.
pub async fn connect(settings: &DatabaseSettings) -> Result<SqlitePool, DbError> {
    let connect_opts = SqliteConnectOptions::from_str(&settings.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(settings.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(connect_opts)
        .await?;

    tracing::info!(
        url = %settings.url,
        max_connections = settings.max_connections,
        "connected to database"
    );

    Ok(pool)
}

/// In-memory database for tests and throwaway runs.
///
/// Every SQLite connection to `:memory:` is its own database, so the pool is
/// pinned to a single connection that is never recycled.
pub async fn connect_in_memory() -> Result<SqlitePool, DbError> {
    let connect_opts = SqliteConnectOptions::from_str("sqlite::memory:")?
        .foreign_keys(true)
        .disable_statement_logging();

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_opts)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_pool_enforces_foreign_keys() {
        let pool = connect_in_memory().await.unwrap();
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn file_pool_creates_missing_database() {
        let path = std::env::temp_dir().join(format!("outlet-db-{}.db", std::process::id()));
        let settings = DatabaseSettings {
            url: format!("sqlite://{}", path.display()),
            ..DatabaseSettings::default()
        };

        let pool = connect(&settings).await.unwrap();
        sqlx::query("SELECT 1").execute(&pool).await.unwrap();
        pool.close().await;

        assert!(path.exists());
        std::fs::remove_file(&path).ok();
    }
}
