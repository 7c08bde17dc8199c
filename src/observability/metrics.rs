use prometheus::{
    Encoder, Histogram, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignment_transitions_total: IntCounterVec,
    pub pending_assignments: IntGauge,
    pub geocode_requests_total: IntCounterVec,
    pub candidate_search_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignment_transitions_total = IntCounterVec::new(
            Opts::new(
                "assignment_transitions_total",
                "Assignment lifecycle transitions by kind",
            ),
            &["transition"],
        )
        .expect("valid assignment_transitions_total metric");

        let pending_assignments = IntGauge::new(
            "pending_assignments",
            "Assignments currently awaiting a provider response",
        )
        .expect("valid pending_assignments metric");

        let geocode_requests_total = IntCounterVec::new(
            Opts::new("geocode_requests_total", "Geocoder calls by result"),
            &["result"],
        )
        .expect("valid geocode_requests_total metric");

        let candidate_search_seconds = Histogram::with_opts(prometheus::HistogramOpts::new(
            "candidate_search_seconds",
            "Latency of candidate matching in seconds",
        ))
        .expect("valid candidate_search_seconds metric");

        registry
            .register(Box::new(assignment_transitions_total.clone()))
            .expect("register assignment_transitions_total");
        registry
            .register(Box::new(pending_assignments.clone()))
            .expect("register pending_assignments");
        registry
            .register(Box::new(geocode_requests_total.clone()))
            .expect("register geocode_requests_total");
        registry
            .register(Box::new(candidate_search_seconds.clone()))
            .expect("register candidate_search_seconds");

        Self {
            registry,
            assignment_transitions_total,
            pending_assignments,
            geocode_requests_total,
            candidate_search_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
