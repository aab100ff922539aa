//! Service metadata at the root path.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use serde_json::json;

use bookshelf_http::RateLimiter;
use bookshelf_kernel::{settings::RateLimitSettings, Module};

const API_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub docs: &'static str,
    pub authentication: &'static str,
}

pub struct MetaModule {
    limiter: Arc<RateLimiter>,
    limits: RateLimitSettings,
}

impl MetaModule {
    pub fn new(limiter: Arc<RateLimiter>, limits: RateLimitSettings) -> Self {
        Self { limiter, limits }
    }
}

#[async_trait]
impl Module for MetaModule {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn routes(&self) -> Router {
        let quota = self.limiter.quota("root", self.limits.root_per_minute);
        Router::new().route("/", quota.apply(get(service_info)))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Service metadata",
                        "tags": ["Meta"],
                        "responses": {
                            "200": {
                                "description": "Name, version and documentation pointer",
                                "content": { "application/json": { "schema": {
                                    "type": "object",
                                    "properties": {
                                        "message": { "type": "string" },
                                        "version": { "type": "string" },
                                        "docs": { "type": "string" },
                                        "authentication": { "type": "string" }
                                    }
                                } } }
                            }
                        }
                    }
                }
            }
        }))
    }
}

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Welcome to the Books API!",
        version: API_VERSION,
        docs: "/swagger-ui",
        authentication: "This API supports API Key and JWT Bearer Token",
    })
}
