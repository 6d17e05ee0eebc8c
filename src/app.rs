//! Application bootstrap: pool, module registry and the module lifecycle.

use anyhow::Context;
use axum::Router;
use outlet_kernel::{InitCtx, ModuleRegistry, Settings};
use sqlx::SqlitePool;

use crate::modules;

/// A fully wired application: settings, the shared pool and every module.
pub struct App {
    settings: Settings,
    pool: SqlitePool,
    registry: ModuleRegistry,
}

impl App {
    /// Connect to the configured database and register all modules
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let pool = outlet_db::connect(&settings.database)
            .await
            .with_context(|| format!("failed to connect to {}", settings.database.url))?;
        Self::with_pool(settings, pool)
    }

    /// Register all modules against an existing pool
    pub fn with_pool(settings: Settings, pool: SqlitePool) -> anyhow::Result<Self> {
        let mut registry = ModuleRegistry::new();
        registry.register_core(outlet_db::create_module(pool.clone()));
        modules::register_all(&mut registry, &pool)?;

        tracing::debug!(
            core = registry.core_module_count(),
            custom = registry.custom_module_count(),
            "modules registered"
        );
        Ok(Self {
            settings,
            pool,
            registry,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Apply every pending module migration; returns how many ran
    pub async fn migrate(&self) -> anyhow::Result<usize> {
        let migrations = self.registry.collect_migrations();
        let applied = outlet_db::run_migrations(&self.pool, &migrations)
            .await
            .context("failed to apply migrations")?;
        tracing::info!(applied, known = migrations.len(), "migrations complete");
        Ok(applied)
    }

    /// Migrate, then run `init` on core modules followed by custom modules
    pub async fn init(&self) -> anyhow::Result<()> {
        self.migrate().await?;
        let ctx = self.ctx();
        self.registry.init_core_modules(&ctx).await?;
        self.registry.init_custom_modules(&ctx).await?;
        Ok(())
    }

    /// The HTTP router with every module mounted
    pub fn router(&self) -> Router {
        outlet_http::build_router(&self.registry, &self.settings)
    }

    /// Full lifecycle: init, start, serve until shutdown, stop in reverse
    pub async fn serve(self) -> anyhow::Result<()> {
        self.init().await?;

        let ctx = self.ctx();
        self.registry.start_core_modules(&ctx).await?;
        self.registry.start_custom_modules(&ctx).await?;

        let served = outlet_http::start_server(&self.registry, &self.settings).await;

        self.registry.stop_custom_modules().await?;
        self.registry.stop_core_modules().await?;
        served
    }

    fn ctx(&self) -> InitCtx<'_> {
        InitCtx {
            settings: &self.settings,
            db: &self.pool,
        }
    }
}
