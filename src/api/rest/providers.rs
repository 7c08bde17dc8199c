use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::reliability::{self, ReliabilityReport};
use crate::error::AppError;
use crate::models::job::Address;
use crate::models::provider::{
    GeoPoint, Provider, MAX_SERVICE_RADIUS_KM, MIN_SERVICE_RADIUS_KM,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/providers", post(create_provider).get(list_providers))
        .route("/providers/:id/location", patch(update_location))
        .route("/providers/:id/availability", patch(update_availability))
        .route("/providers/:id/active", patch(update_active))
        .route("/providers/:id/reliability", get(get_reliability))
}

#[derive(Deserialize)]
pub struct CreateProviderRequest {
    pub name: String,
    pub service_radius_km: u32,
    /// Explicit coordinates win over an address; with neither the provider
    /// starts ungeocoded and will not match until located.
    pub home: Option<GeoPoint>,
    pub address: Option<Address>,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub home: Option<GeoPoint>,
    pub address: Option<Address>,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub date: NaiveDate,
    /// `null` clears the override, falling back to available-by-default.
    pub available: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateActiveRequest {
    pub active: bool,
}

fn validate_radius(service_radius_km: u32) -> Result<(), AppError> {
    if !(MIN_SERVICE_RADIUS_KM..=MAX_SERVICE_RADIUS_KM).contains(&service_radius_km) {
        return Err(AppError::BadRequest(format!(
            "service radius must be between {MIN_SERVICE_RADIUS_KM} and {MAX_SERVICE_RADIUS_KM} km"
        )));
    }
    Ok(())
}

async fn resolve_home(
    state: &AppState,
    home: Option<GeoPoint>,
    address: Option<Address>,
) -> Result<Option<GeoPoint>, AppError> {
    if home.is_some() {
        return Ok(home);
    }

    let Some(address) = address else {
        return Ok(None);
    };

    let result = state.resolver.geocode(&address).await;
    let label = if result.is_ok() { "ok" } else { "error" };
    state
        .metrics
        .geocode_requests_total
        .with_label_values(&[label])
        .inc();

    result.map(Some)
}

async fn create_provider(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProviderRequest>,
) -> Result<Json<Provider>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    validate_radius(payload.service_radius_km)?;

    let home = resolve_home(&state, payload.home, payload.address).await?;

    let provider = Provider {
        id: Uuid::new_v4(),
        name: payload.name,
        home,
        service_radius_km: payload.service_radius_km,
        availability: BTreeMap::new(),
        active: true,
        updated_at: Utc::now(),
    };

    state.providers.insert(provider.id, provider.clone());
    Ok(Json(provider))
}

async fn list_providers(State(state): State<Arc<AppState>>) -> Json<Vec<Provider>> {
    let providers = state
        .providers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(providers)
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Provider>, AppError> {
    if payload.home.is_none() && payload.address.is_none() {
        return Err(AppError::BadRequest(
            "either home coordinates or an address is required".to_string(),
        ));
    }

    // Geocode before taking the entry lock; the call can take seconds.
    let home = resolve_home(&state, payload.home, payload.address).await?;

    let mut provider = state
        .providers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("provider {id} not found")))?;

    provider.home = home;
    provider.updated_at = Utc::now();

    Ok(Json(provider.clone()))
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Provider>, AppError> {
    let mut provider = state
        .providers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("provider {id} not found")))?;

    match payload.available {
        Some(available) => {
            provider.availability.insert(payload.date, available);
        }
        None => {
            provider.availability.remove(&payload.date);
        }
    }
    provider.updated_at = Utc::now();

    Ok(Json(provider.clone()))
}

async fn update_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateActiveRequest>,
) -> Result<Json<Provider>, AppError> {
    let mut provider = state
        .providers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("provider {id} not found")))?;

    provider.active = payload.active;
    provider.updated_at = Utc::now();

    Ok(Json(provider.clone()))
}

async fn get_reliability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReliabilityReport>, AppError> {
    if !state.providers.contains_key(&id) {
        return Err(AppError::NotFound(format!("provider {id} not found")));
    }

    Ok(Json(reliability::score(&state, id)))
}
