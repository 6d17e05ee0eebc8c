pub mod options;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use outlet_kernel::{InitCtx, Module};
use sqlx::SqlitePool;

use crate::modules::books::repo::Catalog;
use crate::utils;
use options::AdminSite;

pub const MODULE_NAME: &str = "admin";

#[derive(Clone)]
pub struct AdminState {
    pub catalog: Catalog,
    pub site: Arc<AdminSite>,
}

/// JSON CRUD over the catalog models, mounted at `/admin`
pub struct AdminModule {
    state: AdminState,
}

impl AdminModule {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            state: AdminState {
                catalog: Catalog::new(pool),
                site: Arc::new(options::catalog_site()),
            },
        }
    }
}

#[async_trait]
impl Module for AdminModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn base_path(&self) -> String {
        "/admin".to_string()
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            prefix = %utils::log_prefix(self.name()),
            models = self.state.site.models.len(),
            "admin module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let mut paths = serde_json::Map::new();
        paths.insert(
            "/".to_string(),
            serde_json::json!({
                "get": {
                    "summary": "Registered models and their admin options",
                    "tags": ["Admin"],
                    "responses": { "200": { "description": "Admin site index" } }
                }
            }),
        );
        paths.insert(
            "/books/prepopulate".to_string(),
            serde_json::json!({
                "get": {
                    "summary": "Slug the title would be stored under",
                    "tags": ["Admin"],
                    "parameters": [{
                        "name": "title", "in": "query", "required": false,
                        "schema": { "type": "string" }
                    }],
                    "responses": { "200": { "description": "Title and derived slug" } }
                }
            }),
        );

        let error = serde_json::json!({
            "description": "Error",
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
        });
        for model in &self.state.site.models {
            let tag = model.verbose_name_plural.clone();
            paths.insert(
                format!("/{}", model.path),
                serde_json::json!({
                    "get": {
                        "summary": format!("Change list of {}", model.verbose_name_plural),
                        "tags": [tag],
                        "responses": { "200": { "description": "Change list" } }
                    },
                    "post": {
                        "summary": format!("Create a {}", model.verbose_name),
                        "tags": [tag],
                        "responses": {
                            "201": { "description": "Created" },
                            "400": error,
                            "422": error
                        }
                    }
                }),
            );
            paths.insert(
                format!("/{}/{{id}}", model.path),
                serde_json::json!({
                    "parameters": [{
                        "name": "id", "in": "path", "required": true,
                        "schema": { "type": "integer" }
                    }],
                    "get": {
                        "summary": format!("Read a {}", model.verbose_name),
                        "tags": [tag],
                        "responses": { "200": { "description": "Change form" }, "404": error }
                    },
                    "put": {
                        "summary": format!("Update a {}", model.verbose_name),
                        "tags": [tag],
                        "responses": { "200": { "description": "Updated" }, "404": error, "422": error }
                    },
                    "delete": {
                        "summary": format!("Delete a {}", model.verbose_name),
                        "tags": [tag],
                        "responses": { "204": { "description": "Deleted" }, "404": error }
                    }
                }),
            );
        }

        Some(serde_json::json!({ "paths": paths }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "admin module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "admin module stopped");
        Ok(())
    }
}

/// Create a new instance of the admin module
pub fn create_module(pool: SqlitePool) -> Arc<dyn Module> {
    Arc::new(AdminModule::new(pool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn openapi_covers_every_registered_model() {
        let pool = SqlitePool::connect_lazy("sqlite::memory:").unwrap();
        let module = AdminModule::new(pool);

        let doc = module.openapi().unwrap();
        for path in ["/", "/books", "/books/{id}", "/authors", "/addresses/{id}", "/countries", "/books/prepopulate"] {
            assert!(doc["paths"].get(path).is_some(), "{path}");
        }
        assert_eq!(module.base_path(), "/admin");
    }
}
