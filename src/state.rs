use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::Config;
use crate::geo::resolver::GeoResolver;
use crate::models::assignment::Assignment;
use crate::models::job::Job;
use crate::models::notification::Notification;
use crate::models::provider::Provider;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub providers: DashMap<Uuid, Provider>,
    pub jobs: DashMap<Uuid, Job>,
    pub assignments: DashMap<Uuid, Assignment>,
    pub notifications_tx: broadcast::Sender<Notification>,
    pub resolver: GeoResolver,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let (notifications_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            providers: DashMap::new(),
            jobs: DashMap::new(),
            assignments: DashMap::new(),
            notifications_tx,
            resolver: GeoResolver::new(&config.geocoder_url, &config.routing_url),
            metrics: Metrics::new(),
        }
    }
}
