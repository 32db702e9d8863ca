//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::db::DbError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(DbError::NotFound(_)) | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            },
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<admissions_common::AdmissionsError> for AppError {
    fn from(err: admissions_common::AdmissionsError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            AppError::Database(DbError::NotFound(message)) | AppError::NotFound(message) => {
                ("NOT_FOUND", message)
            },
            AppError::Database(ref e) => {
                tracing::error!(error = %e, "Database error");
                ("INTERNAL_ERROR", "A database error occurred".to_string())
            },
            AppError::Validation(message) => ("VALIDATION_ERROR", message),
            AppError::Unauthorized(message) => ("UNAUTHORIZED", message),
            AppError::Forbidden(message) => ("FORBIDDEN", message),
            AppError::Conflict(message) => ("CONFLICT", message),
            AppError::PayloadTooLarge(message) => ("PAYLOAD_TOO_LARGE", message),
            AppError::Internal(ref message) => {
                tracing::error!(error = %message, "Internal error");
                ("INTERNAL_ERROR", "An internal error occurred".to_string())
            },
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

/// Alias for Result with AppError
pub type ApiResult<T> = Result<T, AppError>;
