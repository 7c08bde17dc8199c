use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::job::Address;
use crate::models::provider::GeoPoint;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Driving distance and duration for one (origin, destination) pair.
/// Ephemeral; callers persist coordinates themselves if they want a cache.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DistanceQuote {
    pub distance_km: f64,
    pub duration_min: f64,
}

/// Thin HTTP client over a Nominatim-style geocoder and an OSRM-style router.
#[derive(Debug, Clone)]
pub struct GeoResolver {
    client: Client,
    geocoder_url: String,
    routing_url: String,
}

impl GeoResolver {
    pub fn new(geocoder_url: &str, routing_url: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build geo http client");

        Self {
            client,
            geocoder_url: geocoder_url.trim_end_matches('/').to_string(),
            routing_url: routing_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a structured address to coordinates. Zero hits is
    /// `AddressNotFound`; transport and status failures are `Upstream` and
    /// are never retried here.
    pub async fn geocode(&self, address: &Address) -> Result<GeoPoint, AppError> {
        let mut url = Url::parse(&format!("{}/search", self.geocoder_url))
            .map_err(|err| AppError::Internal(format!("invalid geocoder url: {err}")))?;

        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("limit", "1")
            .append_pair("street", &address.street)
            .append_pair("postalcode", &address.postal_code)
            .append_pair("city", &address.city)
            .append_pair("country", address.country_or_default());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| AppError::Upstream(format!("geocoder request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "geocoder returned {}",
                response.status()
            )));
        }

        let hits: Vec<GeocodeHit> = response
            .json()
            .await
            .map_err(|err| AppError::Upstream(format!("geocoder response malformed: {err}")))?;

        parse_geocode_response(hits)
    }

    /// Driving distance between two points. Empty route set is
    /// `NoRouteFound`.
    pub async fn route_distance(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<DistanceQuote, AppError> {
        let mut url = Url::parse(&format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.routing_url, origin.lng, origin.lat, destination.lng, destination.lat
        ))
        .map_err(|err| AppError::Internal(format!("invalid routing url: {err}")))?;

        url.query_pairs_mut().append_pair("overview", "false");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| AppError::Upstream(format!("routing request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "router returned {}",
                response.status()
            )));
        }

        let parsed: RouteResponse = response
            .json()
            .await
            .map_err(|err| AppError::Upstream(format!("routing response malformed: {err}")))?;

        parse_route_response(parsed)
    }
}

// Nominatim serializes coordinates as strings.
#[derive(Debug, Deserialize)]
struct GeocodeHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    distance: f64,
    duration: f64,
}

fn parse_geocode_response(hits: Vec<GeocodeHit>) -> Result<GeoPoint, AppError> {
    let hit = hits.into_iter().next().ok_or(AppError::AddressNotFound)?;

    let lat = hit.lat.parse::<f64>();
    let lng = hit.lon.parse::<f64>();

    match (lat, lng) {
        (Ok(lat), Ok(lng)) => Ok(GeoPoint { lat, lng }),
        _ => Err(AppError::Upstream(
            "geocoder returned malformed coordinates".to_string(),
        )),
    }
}

fn parse_route_response(response: RouteResponse) -> Result<DistanceQuote, AppError> {
    if response.code != "Ok" {
        return Err(AppError::NoRouteFound);
    }

    let route = response.routes.first().ok_or(AppError::NoRouteFound)?;

    Ok(DistanceQuote {
        distance_km: route.distance / 1_000.0,
        duration_min: route.duration / 60.0,
    })
}
