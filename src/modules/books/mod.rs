pub mod models;
pub mod routes;
pub mod store;
pub mod validation;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use serde_json::json;

use bookshelf_authz::AuthGate;
use bookshelf_http::RateLimiter;
use bookshelf_kernel::{settings::RateLimitSettings, InitCtx, Migration, Module};

use routes::BooksState;
use store::BookStore;

/// Book catalogue: CRUD over the `book` table.
pub struct BooksModule {
    state: BooksState,
    gate: Arc<AuthGate>,
    limiter: Arc<RateLimiter>,
    limits: RateLimitSettings,
}

impl BooksModule {
    pub fn new(
        store: BookStore,
        gate: Arc<AuthGate>,
        limiter: Arc<RateLimiter>,
        limits: RateLimitSettings,
    ) -> Self {
        Self {
            state: BooksState { store },
            gate,
            limiter,
            limits,
        }
    }
}

pub(crate) fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: "CREATE TABLE IF NOT EXISTS book (
                id     INTEGER PRIMARY KEY AUTOINCREMENT,
                title  TEXT    NOT NULL,
                author TEXT    NOT NULL,
                year   INTEGER NOT NULL,
                price  REAL    NOT NULL
            );",
    }]
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            database = %ctx.settings.database.path,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone(), &self.gate, &self.limiter, &self.limits)
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
            })
        };
        let book = |description: &str| {
            json!({
                "description": description,
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Book" } } }
            })
        };
        let secured = json!([{ "APIKeyHeader": [] }, { "HTTPBearer": [] }]);
        let id_param = json!({
            "name": "id", "in": "path", "required": true,
            "schema": { "type": "integer" }
        });

        Some(json!({
            "paths": {
                "/books/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "parameters": [
                            { "name": "q", "in": "query", "schema": { "type": "string" },
                              "description": "Case-sensitive substring of title or author" },
                            { "name": "limit", "in": "query", "schema": { "type": "integer", "default": 10, "description": "Negative means no limit" } },
                            { "name": "offset", "in": "query", "schema": { "type": "integer", "default": 0 } }
                        ],
                        "responses": {
                            "200": {
                                "description": "Matching books in creation order",
                                "content": { "application/json": { "schema": {
                                    "type": "array", "items": { "$ref": "#/components/schemas/Book" }
                                } } }
                            },
                            "422": error("Validation error"),
                            "429": error("Rate limit exceeded")
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "security": secured,
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/BookCreate" } } }
                        },
                        "responses": {
                            "200": book("Created book"),
                            "401": error("Missing or invalid credentials"),
                            "422": error("Validation error"),
                            "429": error("Rate limit exceeded")
                        }
                    }
                },
                "/books/{id}": {
                    "get": {
                        "summary": "Get a book",
                        "tags": ["Books"],
                        "parameters": [id_param],
                        "responses": {
                            "200": book("The book"),
                            "404": error("Book not found"),
                            "429": error("Rate limit exceeded")
                        }
                    },
                    "put": {
                        "summary": "Update a book",
                        "tags": ["Books"],
                        "security": secured,
                        "parameters": [id_param],
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/BookUpdate" } } }
                        },
                        "responses": {
                            "200": book("Updated book"),
                            "401": error("Missing or invalid credentials"),
                            "404": error("Book not found"),
                            "422": error("Validation error"),
                            "429": error("Rate limit exceeded")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "security": secured,
                        "parameters": [id_param],
                        "responses": {
                            "200": {
                                "description": "Deletion confirmation",
                                "content": { "application/json": { "schema": {
                                    "type": "object",
                                    "properties": { "message": { "type": "string" } }
                                } } }
                            },
                            "401": error("Missing or invalid credentials"),
                            "404": error("Book not found"),
                            "429": error("Rate limit exceeded")
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
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "year": { "type": "integer" },
                            "price": { "type": "number" }
                        },
                        "required": ["id", "title", "author", "year", "price"]
                    },
                    "BookCreate": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string", "minLength": 1, "maxLength": 200 },
                            "author": { "type": "string", "minLength": 1, "maxLength": 100 },
                            "year": { "type": "integer", "minimum": 0, "maximum": 2100 },
                            "price": { "type": "number", "minimum": 0 }
                        },
                        "required": ["title", "author", "year", "price"]
                    },
                    "BookUpdate": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string", "minLength": 1, "maxLength": 200 },
                            "author": { "type": "string", "minLength": 1, "maxLength": 100 },
                            "year": { "type": "integer", "minimum": 0, "maximum": 2100 },
                            "price": { "type": "number", "minimum": 0 }
                        }
                    }
                }
            }
        }))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}
