//! Store error types with HTTP status code mapping.
//!
//! [`StoreError`] is the central error type for the store. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "session not found: 3kTMd...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`StoreError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Session store error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | Not Found       | 404 Not Found                |
/// | 3000–3999 | Per-call server | 500 Internal Server Error    |
/// | 5000–5999 | Fatal           | 503 Service Unavailable      |
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The connection pool could not be created.
    #[error("failed to create database pool: {0}")]
    PoolCreation(String),

    /// Every acquisition attempt failed, including pool replacements.
    #[error("no database connection after {attempts} attempts: {reason}")]
    AcquireExhausted {
        /// Total acquisition attempts made.
        attempts: u32,
        /// Error message of the final attempt.
        reason: String,
    },

    /// A single connection acquisition failed.
    #[error("cannot acquire database connection: {0}")]
    Acquire(String),

    /// A statement failed at the database.
    #[error("database error: {0}")]
    Database(String),

    /// The stored payload is not valid JSON.
    #[error("failed to parse data for session: {session_id}")]
    CorruptSession {
        /// Identifier of the unreadable session.
        session_id: String,
    },

    /// The session payload could not be serialized.
    #[error("failed to serialize session data: {0}")]
    Serialization(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No session with the given identifier.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The store has entered a fatal state and refuses work.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::SessionNotFound(_) => 2001,
            Self::Database(_) => 3001,
            Self::Acquire(_) => 3002,
            Self::CorruptSession { .. } => 3003,
            Self::Serialization(_) => 3004,
            Self::PoolCreation(_) => 5001,
            Self::AcquireExhausted { .. } => 5002,
            Self::Unavailable(_) => 5003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_)
            | Self::Acquire(_)
            | Self::CorruptSession { .. }
            | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PoolCreation(_) | Self::AcquireExhausted { .. } | Self::Unavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Returns `true` for errors the store cannot recover from locally.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PoolCreation(_) | Self::AcquireExhausted { .. }
        )
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
