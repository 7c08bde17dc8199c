use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::lifecycle;
use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assignments", post(create_assignment).get(list_assignments))
        .route("/assignments/:id/accept", post(accept_assignment))
        .route("/assignments/:id/decline", post(decline_assignment))
        .route("/assignments/:id/complete", post(complete_assignment))
        .route("/assignments/:id/cancel", post(cancel_assignment))
}

#[derive(Deserialize)]
pub struct CreateAssignmentRequest {
    pub job_id: Uuid,
    pub provider_id: Uuid,
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct DeclineRequest {
    pub reason: String,
}

/// Assignment plus the derived deadline fields the clients sort by.
#[derive(Serialize)]
pub struct AssignmentView {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub deadline: DateTime<Utc>,
    pub urgent: bool,
}

impl AssignmentView {
    fn from(assignment: Assignment, now: DateTime<Utc>) -> Self {
        let deadline =
            lifecycle::acceptance_deadline(assignment.assigned_at, assignment.scheduled_for);
        let urgent = lifecycle::is_urgent(&assignment, now);
        Self {
            assignment,
            deadline,
            urgent,
        }
    }
}

/// Identity is supplied by the external auth collaborator and trusted
/// verbatim; this core only checks that a claim is present and well-formed.
fn provider_claim(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let raw = headers
        .get("x-provider-id")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Forbidden("missing x-provider-id header".to_string()))?;

    Uuid::parse_str(raw)
        .map_err(|_| AppError::Forbidden("invalid x-provider-id header".to_string()))
}

async fn create_assignment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateAssignmentRequest>,
) -> Result<Json<AssignmentView>, AppError> {
    let assignment = lifecycle::create_assignment(
        &state,
        payload.job_id,
        payload.provider_id,
        payload.scheduled_for,
    )?;

    Ok(Json(AssignmentView::from(assignment, Utc::now())))
}

async fn list_assignments(State(state): State<Arc<AppState>>) -> Json<Vec<AssignmentView>> {
    let now = Utc::now();
    let mut views: Vec<AssignmentView> = state
        .assignments
        .iter()
        .map(|entry| AssignmentView::from(entry.value().clone(), now))
        .collect();

    // Most pressing offers first.
    views.sort_by_key(|view| view.deadline);

    Json(views)
}

async fn accept_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Assignment>, AppError> {
    let provider = provider_claim(&headers)?;
    let assignment = lifecycle::accept(&state, id, provider)?;
    Ok(Json(assignment))
}

async fn decline_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<DeclineRequest>,
) -> Result<Json<Assignment>, AppError> {
    if payload.reason.trim().is_empty() {
        return Err(AppError::BadRequest(
            "a decline reason is required".to_string(),
        ));
    }

    let provider = provider_claim(&headers)?;
    let assignment = lifecycle::decline(&state, id, provider, payload.reason)?;
    Ok(Json(assignment))
}

async fn complete_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Assignment>, AppError> {
    let provider = provider_claim(&headers)?;
    let assignment = lifecycle::complete(&state, id, provider)?;
    Ok(Json(assignment))
}

async fn cancel_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Assignment>, AppError> {
    let assignment = lifecycle::cancel(&state, id)?;
    Ok(Json(assignment))
}
