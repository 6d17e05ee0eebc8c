//! SQLite persistence for the outlet framework: pool construction, the
//! migration runner and the `db` core module.

use async_trait::async_trait;
use outlet_kernel::{InitCtx, Module};
use sqlx::SqlitePool;

pub mod migrate;
pub mod pool;

pub use migrate::run_migrations;
pub use pool::{connect, connect_in_memory};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration {module}/{id} failed: {source}")]
    Migration {
        module: String,
        id: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Core module that owns the lifecycle of the shared pool.
pub struct DbModule {
    pool: SqlitePool,
}

impl DbModule {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Module for DbModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        tracing::info!(
            module = self.name(),
            connections = self.pool.size(),
            "database pool ready"
        );
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.pool.close().await;
        tracing::info!(module = self.name(), "database pool closed");
        Ok(())
    }
}

/// Create a new instance of the db core module
pub fn create_module(pool: SqlitePool) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(DbModule::new(pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use outlet_kernel::Settings;

    #[tokio::test]
    async fn db_module_pings_and_closes_pool() {
        let pool = connect_in_memory().await.unwrap();
        let settings = Settings::default();
        let module = DbModule::new(pool.clone());
        let ctx = InitCtx {
            settings: &settings,
            db: &pool,
        };

        module.init(&ctx).await.unwrap();
        module.stop().await.unwrap();

        assert!(pool.is_closed());
    }
}
