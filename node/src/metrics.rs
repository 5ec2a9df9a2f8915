//! # Prometheus Metrics
//!
//! Exposes operational metrics for the consensus node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers. [`NodeMetrics`]
//! also implements [`consensus_core::consensus::interfaces::Metrics`], the
//! capability trait the engine is built against — the core crate never
//! depends on `prometheus` directly, only this binary's concrete adapter.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use consensus_core::consensus::interfaces::Metrics;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntGauge, Registry, TextEncoder,
};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers and the consensus runtime.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of poll rounds issued.
    pub polls_started_total: IntCounter,
    /// Total number of poll rounds that reached quorum at some decision
    /// point and updated the chain.
    pub polls_successful_total: IntCounter,
    /// Total number of poll rounds that collected no chits (empty bag,
    /// network error, or timeout).
    pub polls_failed_total: IntCounter,
    /// Per-stage pipeline duration, labeled by stage name (`sample`,
    /// `send`, `tally`, `record_poll`, ...).
    pub stage_duration_seconds: HistogramVec,
    /// Height of the chain's last accepted block.
    pub last_accepted_height: IntGauge,
    /// Number of blocks currently in `Processing`.
    pub processing_blocks: IntGauge,
    /// Number of blocks flagged stalled by the last health check.
    pub stalled_blocks: IntGauge,
    /// 1 if the engine is in `NormalOp`, 0 otherwise.
    pub bootstrapped: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("consensus".into()), None)
            .expect("failed to create prometheus registry");

        let polls_started_total =
            IntCounter::new("polls_started_total", "Total number of poll rounds issued")
                .expect("metric creation");
        registry
            .register(Box::new(polls_started_total.clone()))
            .expect("metric registration");

        let polls_successful_total = IntCounter::new(
            "polls_successful_total",
            "Total number of poll rounds that updated the chain",
        )
        .expect("metric creation");
        registry
            .register(Box::new(polls_successful_total.clone()))
            .expect("metric registration");

        let polls_failed_total = IntCounter::new(
            "polls_failed_total",
            "Total number of poll rounds with no usable chits",
        )
        .expect("metric creation");
        registry
            .register(Box::new(polls_failed_total.clone()))
            .expect("metric registration");

        let stage_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "stage_duration_seconds",
                "Duration of a named engine pipeline stage",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ]),
            &["stage"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(stage_duration_seconds.clone()))
            .expect("metric registration");

        let last_accepted_height = IntGauge::new(
            "last_accepted_height",
            "Height of the chain's last accepted block",
        )
        .expect("metric creation");
        registry
            .register(Box::new(last_accepted_height.clone()))
            .expect("metric registration");

        let processing_blocks = IntGauge::new(
            "processing_blocks",
            "Number of blocks currently in Processing",
        )
        .expect("metric creation");
        registry
            .register(Box::new(processing_blocks.clone()))
            .expect("metric registration");

        let stalled_blocks = IntGauge::new(
            "stalled_blocks",
            "Number of blocks flagged stalled by the last health check",
        )
        .expect("metric creation");
        registry
            .register(Box::new(stalled_blocks.clone()))
            .expect("metric registration");

        let bootstrapped = IntGauge::new(
            "bootstrapped",
            "1 if the engine has left the bootstrap phase, 0 otherwise",
        )
        .expect("metric creation");
        registry
            .register(Box::new(bootstrapped.clone()))
            .expect("metric registration");

        Self {
            registry,
            polls_started_total,
            polls_successful_total,
            polls_failed_total,
            stage_duration_seconds,
            last_accepted_height,
            processing_blocks,
            stalled_blocks,
            bootstrapped,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapts [`NodeMetrics`] to the engine's synchronous [`Metrics`] capability.
impl Metrics for NodeMetrics {
    fn record_poll_started(&self) {
        self.polls_started_total.inc();
    }

    fn record_poll_successful(&self) {
        self.polls_successful_total.inc();
    }

    fn record_poll_failed(&self) {
        self.polls_failed_total.inc();
    }

    fn observe_stage_duration(&self, stage: &str, duration: Duration) {
        self.stage_duration_seconds
            .with_label_values(&[stage])
            .observe(duration.as_secs_f64());
    }
}

/// Shared metrics state passed to axum handlers and the consensus runtime.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
