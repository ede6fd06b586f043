//! # Error Handling and Response Types
//!
//! Every handler returns [`AppResult`]. Errors are rendered as JSON:
//!
//! ```json
//! {
//!   "error": "Human-readable error message",
//!   "code": "machine_readable_error_code",
//!   "details": {...},
//!   "timestamp": "2024-01-01T12:00:00Z"
//! }
//! ```
//!
//! Engine errors map onto status codes as follows:
//!
//! - **400 Bad Request**: invalid filename, name mismatch, malformed upload
//! - **404 Not Found**: unknown project or file
//! - **406 Not Acceptable**: no supported media type in `Accept`
//! - **409 Conflict**: filename already exists
//! - **412 Precondition Failed**: `If-Match` did not match
//! - **413 Payload Too Large**: request body over the configured limit
//! - **500 Internal Server Error**: storage and rendering failures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use pyindex_core::{IndexError, RenderError};
use serde::Serialize;
use serde_json::{json, Value};

/// Standardized error response structure for consistent API error handling
#[derive(Serialize, Debug)]
pub struct ApiErrorResponse {
    pub error: String,          // Human-readable error message
    pub code: String,           // Machine-readable error code
    pub details: Option<Value>, // Additional error details
    pub timestamp: String,      // ISO 8601 timestamp
}

/// Error code classification for machine-readable error types
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    Conflict,
    NotAcceptable,
    PreconditionFailed,
    UploadError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::NotAcceptable => "not_acceptable",
            ErrorCode::PreconditionFailed => "precondition_failed",
            ErrorCode::UploadError => "upload_error",
            ErrorCode::InternalError => "internal_error",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            ErrorCode::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            ErrorCode::UploadError => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Multipart form parsing error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("none of the requested media types are available: {0}")]
    NotAcceptable(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    UploadError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Get the appropriate error code for this error type
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::BadRequest(_) | AppError::Json(_) => ErrorCode::ValidationError,
            AppError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                ErrorCode::UploadError
            }
            AppError::Multipart(_) => ErrorCode::ValidationError,
            AppError::Index(e) => match e {
                IndexError::InvalidFilename { .. }
                | IndexError::InvalidProjectName(_)
                | IndexError::NameMismatch { .. } => ErrorCode::ValidationError,
                IndexError::AlreadyExists { .. } => ErrorCode::Conflict,
                IndexError::NotFound(_) => ErrorCode::NotFound,
                IndexError::Io(_) => ErrorCode::InternalError,
            },
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::NotAcceptable(_) => ErrorCode::NotAcceptable,
            AppError::PreconditionFailed(_) => ErrorCode::PreconditionFailed,
            AppError::UploadError(_) => ErrorCode::UploadError,
            AppError::InternalError(_)
            | AppError::Io(_)
            | AppError::Render(_)
            | AppError::Anyhow(_) => ErrorCode::InternalError,
        }
    }

    /// Get additional error details if available
    pub fn details(&self) -> Option<Value> {
        match self {
            AppError::Index(IndexError::InvalidFilename { filename, reason }) => {
                Some(json!({"filename": filename, "reason": reason}))
            }
            AppError::Index(IndexError::NameMismatch { project, found }) => {
                Some(json!({"project": project, "filename_project": found}))
            }
            AppError::Index(IndexError::AlreadyExists { project, filename }) => {
                Some(json!({"project": project, "filename": filename}))
            }
            AppError::Anyhow(e) => e
                .source()
                .map(|source| json!({"source": source.to_string()})),
            _ => None,
        }
    }

    /// Create a standardized error response
    pub fn to_error_response(&self) -> ApiErrorResponse {
        let code = self.error_code();
        ApiErrorResponse {
            error: self.to_string(),
            code: code.as_str().to_string(),
            details: self.details(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        let status = code.http_status();

        if code == ErrorCode::InternalError {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, status = %status, "Request rejected");
        }

        let error_response = self.to_error_response();
        tracing::debug!(status = %status, code = %error_response.code, "Returning standardized error response");

        (status, axum::Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
