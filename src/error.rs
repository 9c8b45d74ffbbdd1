use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Local persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to encode tags: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Corrupt record {course_id}: {reason}")]
    Corrupt { course_id: String, reason: String },
}

/// Failure to obtain the remote catalog.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Catalog request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode catalog: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid catalog configuration: {0}")]
    Config(String),

    /// Failure reported by a transport other than the built-in HTTP client.
    #[error("{0}")]
    Network(String),
}

/// Storage failure while merging a fetched snapshot into the store.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct MergeError(#[from] pub StoreError);

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("Not found")]
    NotFound,

    #[error("Device is offline")]
    Offline,

    #[error("{0}")]
    Sync(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    InternalServerError,
}

impl AppError {
    /// Human-readable description of the failure, or `fallback` when the
    /// cause carries no text.
    pub fn user_message(&self, fallback: &str) -> String {
        describe(self, fallback)
    }
}

pub(crate) fn describe(err: &dyn std::fmt::Display, fallback: &str) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Offline => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Device is offline".to_string(),
            ),
            AppError::Sync(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Store(e) => {
                error!("store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_uses_cause() {
        let err = AppError::Sync("Network error".to_string());
        assert_eq!(err.user_message("Failed to sync"), "Network error");
    }

    #[test]
    fn user_message_falls_back_when_cause_is_blank() {
        let err = AppError::Sync(String::new());
        assert_eq!(err.user_message("Failed to sync"), "Failed to sync");
    }

    #[test]
    fn merge_error_reports_store_cause() {
        let err = MergeError(StoreError::Corrupt {
            course_id: "A".to_string(),
            reason: "bad tags".to_string(),
        });
        assert_eq!(err.to_string(), "Corrupt record A: bad tags");
    }
}
