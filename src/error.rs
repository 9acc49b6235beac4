use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use time::Date;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::storage::StorageError,
    state::{lyrics::LyricsError, mode::RoundRequestError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Bad mode, date or attempt combination.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Nothing to play: empty catalog or no scheduled song for the date.
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),
    /// Unknown, expired or already removed session.
    #[error("session `{0}` not found")]
    SessionNotFound(Uuid),
    /// A result for the session was already stored.
    #[error("a result was already submitted for session `{0}`")]
    DuplicateSubmission(Uuid),
    /// The player already has a daily result for the date.
    #[error("the daily game of {0} was already played")]
    AlreadyPlayedToday(Date),
    /// Internal invariant violated while building a round.
    #[error("internal consistency error: {0}")]
    InternalConsistency(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<RoundRequestError> for ServiceError {
    fn from(err: RoundRequestError) -> Self {
        ServiceError::InvalidRequest(err.to_string())
    }
}

impl From<LyricsError> for ServiceError {
    fn from(err: LyricsError) -> Self {
        match err {
            LyricsError::NoWords => ServiceError::ContentUnavailable(err.to_string()),
            LyricsError::AnswerNotFound { .. } => {
                ServiceError::InternalConsistency(err.to_string())
            }
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller is identified but not allowed to do this.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidRequest(message) => AppError::BadRequest(message),
            ServiceError::ContentUnavailable(message) => AppError::NotFound(message),
            err @ ServiceError::SessionNotFound(_) => AppError::NotFound(err.to_string()),
            err @ ServiceError::DuplicateSubmission(_) => AppError::Conflict(err.to_string()),
            err @ ServiceError::AlreadyPlayedToday(_) => AppError::Forbidden(err.to_string()),
            ServiceError::InternalConsistency(message) => AppError::Internal(message),
        }
    }
}

/// JSON body returned for every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human readable reason.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
