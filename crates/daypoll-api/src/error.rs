//! Error types for the poll API.
//!
//! [`ApiError`] unifies all failure modes into a single enum that converts
//! into an Axum response with a JSON body `{"error": ..., "status": ...}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use daypoll_core::PollError;
use daypoll_db::ArchiveError;

use crate::auth::AuthError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The caller could not be authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backing store is unreachable or timed out.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PollError> for ApiError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::PollNotFound(id) => Self::NotFound(format!("poll {id} not found today")),
            PollError::InvalidVoteRequest(msg) | PollError::InvalidPollRequest(msg) => {
                Self::BadRequest(msg)
            }
            PollError::StoreUnavailable(e) => {
                tracing::error!(error = %e, timed_out = e.is_timeout(), "Store unavailable");
                Self::Unavailable(e.to_string())
            }
        }
    }
}

impl From<ArchiveError> for ApiError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::NotFound(id) => Self::NotFound(format!("archived question {id} not found")),
            ArchiveError::InvalidValue(msg) => Self::BadRequest(msg),
            other => {
                tracing::error!(error = %other, "Archive operation failed");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        tracing::debug!(error = %err, "Authentication rejected");
        Self::Unauthorized(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
