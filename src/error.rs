use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::storage::StorageError;

/// Error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

/// Service-level errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed date, wrong content type, missing required field, ...
    #[error("Validation error: {0}")]
    Validation(String),

    /// Job not found
    #[error("Job not found: {0}")]
    NotFound(i32),

    /// The job exists but has no retrievable resume
    #[error("No resume available for job {0}")]
    ResumeNotFound(i32),

    /// Storing a new resume failed; only surfaced for uploads
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) | ServiceError::ResumeNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Storage(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ServiceError::Database(e) => {
                error!("Database error: {}", e);
                ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": "Database error occurred"}),
                }
            }
            ServiceError::Validation(msg) => {
                warn!("Validation error: {}", msg);
                ErrorResponse {
                    error: "Validation failed".to_string(),
                    fields: serde_json::json!({"message": msg}),
                }
            }
            ServiceError::NotFound(id) => {
                warn!("Job not found: {}", id);
                ErrorResponse {
                    error: "Not found".to_string(),
                    fields: serde_json::json!({"message": format!("Job with id {} not found", id)}),
                }
            }
            ServiceError::ResumeNotFound(id) => {
                warn!("No resume for job {}", id);
                ErrorResponse {
                    error: "Not found".to_string(),
                    fields: serde_json::json!({"message": format!("No resume uploaded for job {}", id)}),
                }
            }
            ServiceError::Storage(e) => {
                error!("Resume storage error: {}", e);
                ErrorResponse {
                    error: "Failed to store resume".to_string(),
                    fields: serde_json::json!({"message": "Resume storage is unavailable"}),
                }
            }
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
