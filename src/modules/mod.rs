pub mod admin;
pub mod books;

use outlet_kernel::ModuleRegistry;
use sqlx::SqlitePool;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, pool: &SqlitePool) -> anyhow::Result<()> {
    registry.register_custom(books::create_module(pool.clone())?);
    registry.register_custom(admin::create_module(pool.clone()));
    Ok(())
}
