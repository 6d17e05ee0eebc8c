//! Runtime migration runner.
//!
//! Modules contribute plain SQL migrations; applied ones are tracked in the
//! `_migrations` table keyed by `(module, id)`.

use outlet_kernel::Migration;
use sqlx::{Executor, SqlitePool};

use crate::DbError;

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        module TEXT NOT NULL,
        id TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    )
"#;

/// Apply every migration that has not been recorded yet, in the given order.
///
/// Each migration runs in its own transaction together with its bookkeeping
/// row. Returns the number of migrations applied by this call.
pub async fn run_migrations(
    pool: &SqlitePool,
    migrations: &[(String, Migration)],
) -> Result<usize, DbError> {
    pool.execute(CREATE_MIGRATIONS_TABLE).await?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let already: Option<String> =
            sqlx::query_scalar("SELECT id FROM _migrations WHERE module = ? AND id = ?")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(pool)
                .await?;

        if already.is_some() {
            tracing::debug!(module = %module, migration = migration.id, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await?;
        (&mut *tx)
            .execute(migration.up)
            .await
            .map_err(|source| DbError::Migration {
                module: module.clone(),
                id: migration.id,
                source,
            })?;
        sqlx::query("INSERT INTO _migrations (module, id) VALUES (?, ?)")
            .bind(module)
            .bind(migration.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(module = %module, migration = migration.id, "applied migration");
        applied += 1;
    }

    Ok(applied)
}
