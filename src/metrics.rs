//! Prometheus metrics for engine observability

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

/// Metric handles registered against one private registry, so multiple
/// engine instances (tests included) never collide.
pub struct Metrics {
    registry: Registry,
    pub observations_ingested_total: IntCounter,
    pub observations_dropped_total: IntCounter,
    pub observations_rejected_total: IntCounter,
    pub no_data_scores_total: IntCounter,
    pub anomalies_detected_total: IntCounter,
    pub correlation_runs_total: IntCounter,
    pub correlation_timeouts_total: IntCounter,
    pub alerts_open: IntGauge,
    pub tick_duration_seconds: Histogram,
    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let observations_ingested_total = IntCounter::new(
            "vigil_observations_ingested_total",
            "Observations accepted and processed by the engine",
        )?;
        let observations_dropped_total = IntCounter::new(
            "vigil_observations_dropped_total",
            "Observations evicted by the drop-oldest backpressure policy",
        )?;
        let observations_rejected_total = IntCounter::new(
            "vigil_observations_rejected_total",
            "Observations refused at ingress (unregistered key or full queue)",
        )?;
        let no_data_scores_total = IntCounter::new(
            "vigil_no_data_scores_total",
            "Normalized scores carrying the no-data marker",
        )?;
        let anomalies_detected_total = IntCounter::new(
            "vigil_anomalies_detected_total",
            "Anomaly events emitted by any detection rule",
        )?;
        let correlation_runs_total = IntCounter::new(
            "vigil_correlation_runs_total",
            "Correlation pair evaluations completed",
        )?;
        let correlation_timeouts_total = IntCounter::new(
            "vigil_correlation_timeouts_total",
            "Correlation evaluations that exceeded their time budget",
        )?;
        let alerts_open = IntGauge::new(
            "vigil_alerts_open",
            "Alerts currently in an open state",
        )?;
        let tick_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "vigil_tick_duration_seconds",
            "Evaluation tick wall time",
        ))?;
        let http_requests_total = IntCounter::new(
            "vigil_http_requests_total",
            "HTTP requests served",
        )?;
        let http_requests_in_flight = IntGauge::new(
            "vigil_http_requests_in_flight",
            "HTTP requests currently being served",
        )?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "vigil_http_request_duration_seconds",
            "HTTP request wall time",
        ))?;

        registry.register(Box::new(observations_ingested_total.clone()))?;
        registry.register(Box::new(observations_dropped_total.clone()))?;
        registry.register(Box::new(observations_rejected_total.clone()))?;
        registry.register(Box::new(no_data_scores_total.clone()))?;
        registry.register(Box::new(anomalies_detected_total.clone()))?;
        registry.register(Box::new(correlation_runs_total.clone()))?;
        registry.register(Box::new(correlation_timeouts_total.clone()))?;
        registry.register(Box::new(alerts_open.clone()))?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            observations_ingested_total,
            observations_dropped_total,
            observations_rejected_total,
            no_data_scores_total,
            anomalies_detected_total,
            correlation_runs_total,
            correlation_timeouts_total,
            alerts_open,
            tick_duration_seconds,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
        })
    }

    /// Text exposition for the `/metrics` endpoint.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&self.registry.gather())
    }
}
