use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

pub const MIN_SERVICE_RADIUS_KM: u32 = 10;
pub const MAX_SERVICE_RADIUS_KM: u32 = 200;

/// A field worker who can be matched to jobs within their service radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    /// Home base; `None` until an address has been geocoded.
    pub home: Option<GeoPoint>,
    pub service_radius_km: u32,
    /// Explicit per-date overrides; a date without an entry means available.
    pub availability: BTreeMap<NaiveDate, bool>,
    /// Soft-disable flag; inactive providers never match.
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    pub fn is_available_on(&self, date: NaiveDate) -> bool {
        self.availability.get(&date).copied().unwrap_or(true)
    }
}
