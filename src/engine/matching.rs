use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::geo::haversine_km;
use crate::models::provider::GeoPoint;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub provider_id: Uuid,
    pub name: String,
    pub distance_km: f64,
    pub available: bool,
}

/// Radius- and availability-filtered providers around a job location,
/// nearest first. Distance here is the haversine pre-filter; the chosen
/// candidate is priced with the driving distance from the resolver.
///
/// An empty result is a successful outcome, not an error; the caller owns
/// the no-provider fallback.
pub fn find_candidates(
    state: &AppState,
    location: &GeoPoint,
    date: Option<NaiveDate>,
    max_distance_km: f64,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = state
        .providers
        .iter()
        .filter_map(|entry| {
            let provider = entry.value();

            if !provider.active {
                return None;
            }

            let home = provider.home?;
            let distance_km = haversine_km(&home, location);

            if distance_km > provider.service_radius_km as f64 || distance_km > max_distance_km {
                return None;
            }

            // Available-by-default: providers opt out per date, not in.
            if let Some(date) = date {
                if !provider.is_available_on(date) {
                    return None;
                }
            }

            Some(Candidate {
                provider_id: provider.id,
                name: provider.name.clone(),
                distance_km,
                available: true,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| a.provider_id.cmp(&b.provider_id))
    });

    candidates
}
