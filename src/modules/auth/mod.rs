//! Token issuance for the demo login.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use bookshelf_authz::{AuthGate, IssuedToken};
use bookshelf_http::{AppError, RateLimiter};
use bookshelf_kernel::{settings::RateLimitSettings, Module};

pub struct AuthModule {
    gate: Arc<AuthGate>,
    limiter: Arc<RateLimiter>,
    limits: RateLimitSettings,
}

impl AuthModule {
    pub fn new(gate: Arc<AuthGate>, limiter: Arc<RateLimiter>, limits: RateLimitSettings) -> Self {
        Self {
            gate,
            limiter,
            limits,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginQuery {
    username: String,
    password: String,
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn routes(&self) -> Router {
        let quota = self.limiter.quota("auth.token", self.limits.token_per_minute);

        Router::new()
            .route("/auth/token", quota.apply(post(issue_token)))
            .with_state(Arc::clone(&self.gate))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
            })
        };

        Some(json!({
            "paths": {
                "/auth/token": {
                    "post": {
                        "summary": "Exchange username and password for a bearer token",
                        "tags": ["Authentication"],
                        "parameters": [
                            { "name": "username", "in": "query", "required": true, "schema": { "type": "string" } },
                            { "name": "password", "in": "query", "required": true, "schema": { "type": "string" } }
                        ],
                        "responses": {
                            "200": {
                                "description": "Signed access token",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Token" } } }
                            },
                            "401": error("Incorrect username or password"),
                            "422": error("Validation error"),
                            "429": error("Rate limit exceeded")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Token": {
                        "type": "object",
                        "properties": {
                            "access_token": { "type": "string" },
                            "token_type": { "type": "string", "example": "bearer" },
                            "expires_in": { "type": "integer", "description": "Lifetime in seconds" }
                        },
                        "required": ["access_token", "token_type", "expires_in"]
                    }
                }
            }
        }))
    }
}

async fn issue_token(
    State(gate): State<Arc<AuthGate>>,
    login: Result<Query<LoginQuery>, QueryRejection>,
) -> Result<Json<IssuedToken>, AppError> {
    let Query(login) = login?;

    let token = gate
        .issue_token(&login.username, &login.password)
        .inspect_err(|err| tracing::info!(username = %login.username, reason = %err, "login rejected"))?;
    tracing::info!(username = %login.username, "access token issued");

    Ok(Json(token))
}
