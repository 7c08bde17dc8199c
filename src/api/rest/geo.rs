use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::engine::pricing::{self, TravelQuote};
use crate::error::AppError;
use crate::models::job::Address;
use crate::models::provider::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/geo/resolve", post(resolve_address))
        .route("/pricing/quote", get(quote_travel_cost))
}

#[derive(Deserialize)]
pub struct QuoteQuery {
    pub distance_km: f64,
    pub duration_min: Option<f64>,
}

async fn resolve_address(
    State(state): State<Arc<AppState>>,
    Json(address): Json<Address>,
) -> Result<Json<GeoPoint>, AppError> {
    let result = state.resolver.geocode(&address).await;
    let label = if result.is_ok() { "ok" } else { "error" };
    state
        .metrics
        .geocode_requests_total
        .with_label_values(&[label])
        .inc();

    Ok(Json(result?))
}

/// Price a known one-way distance, e.g. the one already computed for the
/// chosen candidate.
async fn quote_travel_cost(
    Query(query): Query<QuoteQuery>,
) -> Result<Json<TravelQuote>, AppError> {
    let price_eur = pricing::price(query.distance_km)?;

    Ok(Json(TravelQuote {
        distance_km: query.distance_km,
        duration_min: query.duration_min.unwrap_or(0.0),
        price_eur,
        free: price_eur == 0,
    }))
}
