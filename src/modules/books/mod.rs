pub mod models;
pub mod repo;
pub mod routes;
pub mod templates;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use outlet_kernel::{InitCtx, Migration, Module};
use sqlx::SqlitePool;
use tera::Tera;

use crate::utils;
use repo::Catalog;

pub const MODULE_NAME: &str = "books";

/// Shared state of the book views
#[derive(Clone)]
pub struct BooksState {
    pub catalog: Catalog,
    pub templates: Arc<Tera>,
}

/// Public catalog: the book list and detail pages at the site root
pub struct BooksModule {
    state: BooksState,
}

impl BooksModule {
    pub fn new(pool: SqlitePool) -> anyhow::Result<Self> {
        let templates = templates::load().context("failed to compile book templates")?;
        Ok(Self {
            state: BooksState {
                catalog: Catalog::new(pool),
                templates: Arc::new(templates),
            },
        })
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn base_path(&self) -> String {
        "/".to_string()
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let stats = self
            .state
            .catalog
            .stats(&models::BookFilter::default())
            .await?;
        tracing::info!(
            module = self.name(),
            prefix = %utils::log_prefix(self.name()),
            environment = ?ctx.settings.environment,
            books = stats.total,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Book list page with count and rating aggregates",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "Rendered list",
                                "content": { "text/html": { "schema": { "type": "string" } } }
                            }
                        }
                    }
                },
                "/{slug}": {
                    "get": {
                        "summary": "Book detail page by slug",
                        "tags": ["Books"],
                        "parameters": [{
                            "name": "slug", "in": "path", "required": true,
                            "schema": { "type": "string" }
                        }],
                        "responses": {
                            "200": {
                                "description": "Rendered detail",
                                "content": { "text/html": { "schema": { "type": "string" } } }
                            },
                            "404": {
                                "description": "No book with this slug",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
                            }
                        }
                    }
                },
                "/book/{id}": {
                    "get": {
                        "summary": "Book detail page by primary key",
                        "tags": ["Books"],
                        "parameters": [{
                            "name": "id", "in": "path", "required": true,
                            "schema": { "type": "integer" }
                        }],
                        "responses": {
                            "200": {
                                "description": "Rendered detail",
                                "content": { "text/html": { "schema": { "type": "string" } } }
                            },
                            "404": {
                                "description": "No book with this id",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
                            }
                        }
                    }
                },
                "/api/books": {
                    "get": {
                        "summary": "List books with aggregates",
                        "tags": ["Books"],
                        "parameters": [
                            { "name": "author", "in": "query", "required": false, "schema": { "type": "integer" } },
                            { "name": "rating", "in": "query", "required": false, "schema": { "type": "integer" } }
                        ],
                        "responses": {
                            "200": {
                                "description": "Books and aggregates",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/BookList" } } }
                            }
                        }
                    }
                },
                "/api/books/{slug}": {
                    "get": {
                        "summary": "Book by slug",
                        "tags": ["Books"],
                        "parameters": [{
                            "name": "slug", "in": "path", "required": true,
                            "schema": { "type": "string" }
                        }],
                        "responses": {
                            "200": {
                                "description": "Book",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/BookDetail" } } }
                            },
                            "404": {
                                "description": "No book with this slug",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "title": { "type": "string", "maxLength": 50 },
                            "rating": { "type": "integer", "minimum": 1, "maximum": 5 },
                            "author_id": { "type": "integer", "nullable": true },
                            "author_name": { "type": "string", "nullable": true },
                            "is_bestselling": { "type": "boolean" },
                            "slug": { "type": "string", "description": "Derived from the title on every save" }
                        },
                        "required": ["id", "title", "rating", "is_bestselling", "slug"]
                    },
                    "BookList": {
                        "type": "object",
                        "properties": {
                            "books": { "type": "array", "items": { "$ref": "#/components/schemas/Book" } },
                            "total_number_of_books": { "type": "integer" },
                            "average_rating": { "type": "number", "nullable": true },
                            "min_rating": { "type": "integer", "nullable": true },
                            "max_rating": { "type": "integer", "nullable": true }
                        },
                        "required": ["books", "total_number_of_books"]
                    },
                    "BookDetail": {
                        "type": "object",
                        "properties": {
                            "book": { "$ref": "#/components/schemas/Book" },
                            "author": { "type": "string", "nullable": true },
                            "countries": { "type": "array", "items": { "type": "string" } },
                            "url": { "type": "string" }
                        },
                        "required": ["book", "countries", "url"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Schema for countries, addresses, authors, books and the book/country link
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE countries (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL CHECK (length(name) BETWEEN 1 AND 80),
                code TEXT NOT NULL CHECK (length(code) = 2)
            );

            CREATE TABLE addresses (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                street      TEXT NOT NULL CHECK (length(street) BETWEEN 1 AND 80),
                postal_code TEXT NOT NULL CHECK (length(postal_code) BETWEEN 1 AND 5),
                city        TEXT NOT NULL CHECK (length(city) BETWEEN 1 AND 50)
            );

            CREATE TABLE authors (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL CHECK (length(first_name) BETWEEN 1 AND 100),
                last_name  TEXT NOT NULL CHECK (length(last_name) BETWEEN 1 AND 100),
                address_id INTEGER UNIQUE REFERENCES addresses (id) ON DELETE CASCADE
            );

            CREATE TABLE books (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                title          TEXT NOT NULL CHECK (length(title) BETWEEN 1 AND 50),
                rating         INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                author_id      INTEGER REFERENCES authors (id) ON DELETE CASCADE,
                is_bestselling BOOLEAN NOT NULL DEFAULT 0,
                slug           TEXT NOT NULL DEFAULT ''
            );
            CREATE INDEX books_slug ON books (slug);
            CREATE INDEX books_author ON books (author_id);

            CREATE TABLE book_published_countries (
                book_id    INTEGER NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                country_id INTEGER NOT NULL REFERENCES countries (id) ON DELETE CASCADE,
                PRIMARY KEY (book_id, country_id)
            );
            CREATE INDEX book_published_countries_country ON book_published_countries (country_id);
            "#,
    }]
}

/// Create a new instance of the books module
pub fn create_module(pool: SqlitePool) -> anyhow::Result<Arc<dyn Module>> {
    Ok(Arc::new(BooksModule::new(pool)?))
}
