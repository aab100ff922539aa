//! Error handling for the bookshelf HTTP layer

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use bookshelf_authz::{AuthError, AuthFailure};

const VALIDATION_SUMMARY: &str = "Request validation failed";
const ERROR_SUMMARY: &str = "An error occurred";

/// Standard error response format for all HTTP errors
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// A string for most errors, a list of field violations for validation
    pub detail: serde_json::Value,
    /// `validation_error` or `error`
    pub error_type: &'static str,
    pub message: &'static str,
    pub code: String,
    pub trace_id: String,
    pub timestamp: String,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("not found: {message}")]
    NotFound { message: String, code: String },

    #[error("unauthorized: {message}")]
    Unauthorized { message: String, code: String },

    #[error("forbidden: {message}")]
    Forbidden { message: String, code: String },

    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        code: String,
        retry_after_secs: u64,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error listing every violation in `details`
    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            code: "validation_error".to_string(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: "not_found".to_string(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            code: "unauthorized".to_string(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            code: "forbidden".to_string(),
        }
    }

    /// Create a rate limit error
    pub fn rate_limited(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::RateLimited {
            message: message.into(),
            code: "rate_limited".to_string(),
            retry_after_secs,
        }
    }

    fn single_field(field: &str, kind: &str, error: String) -> Self {
        Self::validation(
            vec![json!({ "field": field, "error": error, "type": kind })],
            VALIDATION_SUMMARY,
        )
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err.failure() {
            AuthFailure::Unauthenticated => AppError::unauthorized(err.to_string()),
            AuthFailure::Forbidden => AppError::forbidden(err.to_string()),
            AuthFailure::Internal => AppError::Internal(anyhow::Error::new(err)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::single_field("body", "json_invalid", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::single_field("path", "path_invalid", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::single_field("query", "query_invalid", rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc().to_string();

        let mut retry_after = None;
        let (status, code, detail) = match self {
            AppError::Validation { details, code, .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, code, json!(details))
            }
            AppError::NotFound { message, code } => (StatusCode::NOT_FOUND, code, json!(message)),
            AppError::Unauthorized { message, code } => {
                (StatusCode::UNAUTHORIZED, code, json!(message))
            }
            AppError::Forbidden { message, code } => (StatusCode::FORBIDDEN, code, json!(message)),
            AppError::RateLimited {
                message,
                code,
                retry_after_secs,
            } => {
                retry_after = Some(retry_after_secs);
                (StatusCode::TOO_MANY_REQUESTS, code, json!(message))
            }
            AppError::Internal(e) => {
                tracing::error!(error_id = %error_id, error = ?e, "internal error");
                // Hide internal details outside debug builds
                let detail = if cfg!(debug_assertions) {
                    e.to_string()
                } else {
                    "An internal server error occurred".to_string()
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error".to_string(),
                    json!(detail),
                )
            }
        };

        tracing::warn!(
            error_id = %error_id,
            error_code = %code,
            status_code = %status.as_u16(),
            "request error"
        );

        let (error_type, message) = if status == StatusCode::UNPROCESSABLE_ENTITY {
            ("validation_error", VALIDATION_SUMMARY)
        } else {
            ("error", ERROR_SUMMARY)
        };

        let body = ErrorBody {
            detail,
            error_type,
            message,
            code,
            trace_id: error_id.to_string(),
            timestamp,
        };

        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        if let Some(secs) = retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
