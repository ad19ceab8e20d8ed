use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::bid::BidStatus;
use crate::models::job::JobStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// A driver acting on a bid or job that is not theirs, or an inactive
    /// driver trying to bid.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("job {job_id} is not accepting bids: {reason}")]
    JobNotBiddable { job_id: Uuid, reason: String },

    #[error("driver {driver_id} already has an active bid on job {job_id}")]
    DuplicateBid { job_id: Uuid, driver_id: Uuid },

    #[error("bid {bid_id} is {status:?}, not active")]
    BidNotActive { bid_id: Uuid, status: BidStatus },

    #[error("invalid bid amount: {0}")]
    InvalidAmount(f64),

    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("timed out waiting for lock on job {0}")]
    LockTimeout(Uuid),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors worth retrying on the next sweep rather than surfacing as final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::LockTimeout(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::JobNotBiddable { .. } => StatusCode::CONFLICT,
            AppError::DuplicateBid { .. } => StatusCode::CONFLICT,
            AppError::BidNotActive { .. } => StatusCode::CONFLICT,
            AppError::InvalidAmount(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvariantViolation(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
