use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::matching::{self, Candidate};
use crate::engine::pricing::{self, TravelQuote};
use crate::error::AppError;
use crate::models::job::{Address, Job, JobStatus};
use crate::models::provider::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", post(create_job))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/cancel", post(cancel_job))
        .route("/jobs/:id/candidates", get(list_candidates))
        .route("/jobs/:id/travel-quote", get(travel_quote))
}

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub address: Address,
    pub requested_for: Option<DateTime<Utc>>,
    /// Explicit coordinates skip the geocoder (operator-placed pin).
    pub location: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct CandidateQuery {
    pub date: Option<NaiveDate>,
    pub max_distance_km: Option<f64>,
}

#[derive(Deserialize)]
pub struct TravelQuoteQuery {
    pub provider_id: Uuid,
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateJobRequest>,
) -> Result<Json<Job>, AppError> {
    if payload.address.street.trim().is_empty() || payload.address.city.trim().is_empty() {
        return Err(AppError::BadRequest(
            "street and city are required".to_string(),
        ));
    }

    // Geocode once at creation; the coordinates are cached on the record so
    // candidate searches never re-hit the upstream for the same job.
    let (location, geocoded_at) = match payload.location {
        Some(point) => (Some(point), None),
        None => {
            let result = state.resolver.geocode(&payload.address).await;
            let label = if result.is_ok() { "ok" } else { "error" };
            state
                .metrics
                .geocode_requests_total
                .with_label_values(&[label])
                .inc();
            (Some(result?), Some(Utc::now()))
        }
    };

    let job = Job {
        id: Uuid::new_v4(),
        address: payload.address,
        requested_for: payload.requested_for,
        status: JobStatus::Open,
        total_cents: 0,
        location,
        geocoded_at,
        created_at: Utc::now(),
    };

    state.jobs.insert(job.id, job.clone());
    Ok(Json(job))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    let job = state
        .jobs
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

    Ok(Json(job.value().clone()))
}

async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    let mut job = state
        .jobs
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

    if job.status != JobStatus::Open {
        return Err(AppError::JobNotOpen(id, job.status));
    }

    job.status = JobStatus::Cancelled;
    Ok(Json(job.clone()))
}

async fn list_candidates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<CandidateQuery>,
) -> Result<Json<Vec<Candidate>>, AppError> {
    let (location, requested_for) = {
        let job = state
            .jobs
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

        let location = job.location.ok_or_else(|| {
            AppError::BadRequest(format!("job {id} has no geocoded location"))
        })?;

        (location, job.requested_for)
    };

    // The job's own requested date is the default availability filter.
    let date = query.date.or_else(|| requested_for.map(|at| at.date_naive()));

    let max_distance_km = query.max_distance_km.unwrap_or(300.0);
    if max_distance_km <= 0.0 {
        return Err(AppError::BadRequest(
            "max_distance_km must be positive".to_string(),
        ));
    }

    let start = Instant::now();
    let candidates = matching::find_candidates(&state, &location, date, max_distance_km);
    state
        .metrics
        .candidate_search_seconds
        .observe(start.elapsed().as_secs_f64());

    Ok(Json(candidates))
}

/// Driving-distance price for the chosen provider. This is the one place a
/// candidate's distance goes through the router instead of the pre-filter.
async fn travel_quote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<TravelQuoteQuery>,
) -> Result<Json<TravelQuote>, AppError> {
    let destination = {
        let job = state
            .jobs
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

        job.location.ok_or_else(|| {
            AppError::BadRequest(format!("job {id} has no geocoded location"))
        })?
    };

    let origin = {
        let provider = state.providers.get(&query.provider_id).ok_or_else(|| {
            AppError::NotFound(format!("provider {} not found", query.provider_id))
        })?;

        provider.home.ok_or_else(|| {
            AppError::BadRequest(format!(
                "provider {} has no geocoded home",
                query.provider_id
            ))
        })?
    };

    let quote = state.resolver.route_distance(&origin, &destination).await?;
    let price_eur = pricing::price(quote.distance_km)?;

    Ok(Json(TravelQuote {
        distance_km: quote.distance_km,
        duration_min: quote.duration_min,
        price_eur,
        free: price_eur == 0,
    }))
}
