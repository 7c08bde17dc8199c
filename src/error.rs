use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::assignment::AssignmentStatus;
use crate::models::job::JobStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("address could not be geocoded")]
    AddressNotFound,

    #[error("no driving route between the given points")]
    NoRouteFound,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid distance: {0} km")]
    InvalidDistance(f64),

    #[error("job {0} already has an active assignment")]
    DuplicateActiveAssignment(Uuid),

    #[error("job {0} is {1}")]
    JobNotOpen(Uuid, JobStatus),

    #[error("invalid transition: assignment is {0}")]
    InvalidTransition(AssignmentStatus),

    #[error("assignment already resolved as {0}")]
    AlreadyResolved(AssignmentStatus),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) | AppError::InvalidDistance(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::AddressNotFound | AppError::NoRouteFound => {
                StatusCode::NOT_FOUND
            }
            AppError::DuplicateActiveAssignment(_)
            | AppError::JobNotOpen(_, _)
            | AppError::InvalidTransition(_)
            | AppError::AlreadyResolved(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = json!({
            "error": self.to_string()
        });

        // Stale-state conflicts carry the authoritative status so clients
        // reconcile by refetching instead of retrying the write blindly.
        if let AppError::AlreadyResolved(current) | AppError::InvalidTransition(current) = &self {
            body["current_status"] = json!(current);
        }

        (status, Json(body)).into_response()
    }
}
