//! Typed error handling for the user cache
//!
//! Every fallible operation in the cache returns [`CacheError`]. The variants
//! split along how a caller is expected to react:
//!
//! - [`CacheError::Request`]: the source failed (network, non-2xx). Shown to the
//!   user, retryable.
//! - [`CacheError::Aborted`]: a request was cancelled because its parameters
//!   were superseded. Never shown to the user; the fetch coordinator swallows it.
//! - [`CacheError::Validation`]: a malformed filter, sort or patch. Rejected
//!   before anything is sent to the source.
//! - [`CacheError::NotFound`]: an edit targeted an unknown record. Shown to the
//!   user, not retryable without re-selecting.
//!
//! # Example
//!
//! ```rust,ignore
//! match controller.go_to_page(3).await {
//!     Ok(slice) => render(slice),
//!     Err(e) if e.is_user_visible() => show_retry(e.to_string()),
//!     Err(_) => {}
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Result alias used throughout the cache
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// The error type for cache, source and server operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    /// The source answered with a failure status or could not be reached
    #[error("Request failed with status {status}: {message}")]
    Request { status: u16, message: String },

    /// The request was cancelled before completion
    #[error("Request aborted")]
    Aborted,

    /// A filter, sort or patch parameter is malformed
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// The edit target does not exist
    #[error("User with id '{id}' not found")]
    NotFound { id: u64 },

    /// An edit for this record is already outstanding
    #[error("An edit for user '{id}' is already in progress")]
    EditInProgress { id: u64 },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl CacheError {
    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        CacheError::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a request failure
    pub fn request(status: u16, message: impl Into<String>) -> Self {
        CacheError::Request {
            status,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CacheError::Request { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            // Closest match to "client closed request"
            CacheError::Aborted => StatusCode::REQUEST_TIMEOUT,
            CacheError::Validation { .. } => StatusCode::BAD_REQUEST,
            CacheError::NotFound { .. } => StatusCode::NOT_FOUND,
            CacheError::EditInProgress { .. } => StatusCode::CONFLICT,
            CacheError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            CacheError::Request { .. } => "REQUEST_FAILED",
            CacheError::Aborted => "ABORTED",
            CacheError::Validation { .. } => "VALIDATION_ERROR",
            CacheError::NotFound { .. } => "USER_NOT_FOUND",
            CacheError::EditInProgress { .. } => "EDIT_IN_PROGRESS",
            CacheError::Config { .. } => "CONFIG_ERROR",
            CacheError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether re-issuing the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Request { .. })
    }

    /// Whether the error should reach the user at all
    ///
    /// Cancellations are an implementation detail of superseded requests.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, CacheError::Aborted)
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for CacheError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CacheError::Validation {
            message: errors.to_string(),
        }
    }
}
