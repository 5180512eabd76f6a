//! Application error type and its HTTP mapping.
//!
//! Hot-path failures (quota, durable lookups) surface as [`AppError`] and are
//! returned synchronously to the caller. Background failures never reach this
//! type; they are logged where they happen.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::infrastructure::cache::StoreError;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
    details: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, details: Value },
    #[error("{message}")]
    NotFound { message: String, details: Value },
    #[error("{message}")]
    Conflict { message: String, details: Value },
    #[error("{message}")]
    QuotaExceeded {
        message: String,
        retry_after: Duration,
    },
    #[error("{message}")]
    Store { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }
    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }
    pub fn store(message: impl Into<String>, details: Value) -> Self {
        Self::Store {
            message: message.into(),
            details,
        }
    }

    /// Builds the quota error shown to callers, e.g.
    /// `you have exhausted your quota for Resolve URL, 12 seconds to retry again`.
    pub fn quota_exceeded(action: &str, retry_after: Duration) -> Self {
        Self::QuotaExceeded {
            message: format!(
                "you have exhausted your quota for {}, {} to retry again",
                action,
                format_retry_after(retry_after)
            ),
            retry_after,
        }
    }
}

/// Whole seconds, rounded up so a denial never advertises "0 seconds".
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

fn format_retry_after(retry_after: Duration) -> String {
    match retry_after_secs(retry_after) {
        1 => "1 second".to_string(),
        n => format!("{} seconds", n),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_header = None;

        let (status, code, message, details) = match self {
            AppError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message,
                details,
            ),
            AppError::NotFound { message, details } => {
                (StatusCode::NOT_FOUND, "not_found", message, details)
            }
            AppError::Conflict { message, details } => {
                (StatusCode::CONFLICT, "conflict", message, details)
            }
            AppError::QuotaExceeded {
                message,
                retry_after,
            } => {
                let secs = retry_after_secs(retry_after);
                retry_header = Some(secs);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "quota_exceeded",
                    message,
                    json!({ "retry_after_seconds": secs }),
                )
            }
            AppError::Store { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message,
                details,
            ),
        };

        let body = ErrorBody {
            error: ErrorInfo {
                code,
                message,
                details,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_header {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub fn map_sqlx_error(e: sqlx::Error) -> AppError {
    if let Some(db) = e.as_database_error()
        && db.is_unique_violation()
    {
        return AppError::conflict(
            "Unique constraint violation",
            json!({ "constraint": db.constraint() }),
        );
    }

    tracing::error!("Database error: {}", e);
    AppError::store("Database error", json!({}))
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        map_sqlx_error(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::store("Fast store error", json!({ "reason": e.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(30)), 30);
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[test]
    fn test_quota_message() {
        let err = AppError::quota_exceeded("Resolve URL", Duration::from_secs(12));
        assert_eq!(
            err.to_string(),
            "you have exhausted your quota for Resolve URL, 12 seconds to retry again"
        );
    }

    #[test]
    fn test_quota_response_sets_retry_after_header() {
        let response =
            AppError::quota_exceeded("Resolve URL", Duration::from_secs(7)).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "7");
    }

    #[test]
    fn test_store_error_maps_to_internal() {
        let err: AppError = StoreError::Connection("refused".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
