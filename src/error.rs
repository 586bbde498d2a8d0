use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::allocation::AllocationError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

fn allocation_status(err: &AllocationError) -> StatusCode {
    match err {
        AllocationError::ApplicationNotFound(_) | AllocationError::VacancyNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        AllocationError::Forbidden => StatusCode::FORBIDDEN,
        AllocationError::InvalidCapacity(_) | AllocationError::InvalidOfferWindow { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AllocationError::InvalidStateTransition { .. }
        | AllocationError::CapacityExhausted
        | AllocationError::VacancyInactive
        | AllocationError::VacancyUnavailable
        | AllocationError::OfferExpired
        | AllocationError::StudentAlreadyPlaced
        | AllocationError::DuplicateApplication => StatusCode::CONFLICT,
        AllocationError::InvariantViolation(_) | AllocationError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, code, error_message) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, "validation", err.to_string()),
            Error::Allocation(err) if err.is_fatal() => {
                tracing::error!(error = %err, "allocation failure surfaced to caller");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    err.code(),
                    "An unexpected error occurred".to_string(),
                )
            }
            Error::Allocation(err) => (allocation_status(&err), err.code(), err.to_string()),
            other => {
                tracing::error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": error_message, "code": code }));
        (status, body).into_response()
    }
}
