use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// - Order creation and status transitions
// - Rejected requests by reason
// - Broadcast fan-out (published events, lagging subscribers)
// - Viewer alerts
//
// All metrics are registered with one Registry and scraped via /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub orders_created: IntCounter,
    pub status_transitions: IntCounterVec,
    pub rejected_requests: IntCounterVec,
    pub store_duration: HistogramVec,

    // Broadcast Metrics
    pub events_published: IntCounterVec,
    pub broadcast_lagged: IntCounter,
    pub subscribers: IntGauge,

    // Viewer Metrics
    pub alerts_raised: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let status_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Committed status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(status_transitions.clone()))?;

        let rejected_requests = IntCounterVec::new(
            Opts::new("order_requests_rejected_total", "Rejected order operations"),
            &["operation", "reason"],
        )?;
        registry.register(Box::new(rejected_requests.clone()))?;

        let store_duration = HistogramVec::new(
            HistogramOpts::new("order_store_duration_seconds", "Order store operation duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(store_duration.clone()))?;

        let events_published = IntCounterVec::new(
            Opts::new("order_events_published_total", "Order events handed to the broadcaster"),
            &["event_type"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let broadcast_lagged = IntCounter::new(
            "order_events_lagged_total",
            "Events skipped by subscribers that fell behind",
        )?;
        registry.register(Box::new(broadcast_lagged.clone()))?;

        let subscribers = IntGauge::new("order_event_subscribers", "Currently attached subscribers")?;
        registry.register(Box::new(subscribers.clone()))?;

        let alerts_raised = IntCounter::new("viewer_alerts_total", "Alerts raised for new orders")?;
        registry.register(Box::new(alerts_raised.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            status_transitions,
            rejected_requests,
            store_duration,
            events_published,
            broadcast_lagged,
            subscribers,
            alerts_raised,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    pub fn record_transition(&self, from: &str, to: &str) {
        self.status_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_rejection(&self, operation: &str, reason: &str) {
        self.rejected_requests.with_label_values(&[operation, reason]).inc();
    }

    pub fn observe_store(&self, operation: &str, duration_secs: f64) {
        self.store_duration.with_label_values(&[operation]).observe(duration_secs);
    }

    pub fn record_published(&self, event_type: &str) {
        self.events_published.with_label_values(&[event_type]).inc();
    }

    pub fn record_lagged(&self, skipped: u64) {
        self.broadcast_lagged.inc_by(skipped);
    }
}
