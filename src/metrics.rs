//! metrics.rs — Prometheus recorder + `/metrics` route.

use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// Metric names used across the crate (counter!/gauge! call sites).
pub const SESSIONS_STARTED: &str = "screener_sessions_started_total";
pub const SESSION_START_FAILURES: &str = "screener_session_start_failures_total";
pub const POLL_TICKS: &str = "screener_poll_ticks_total";
pub const POLL_FAILURES: &str = "screener_poll_failures_total";
pub const RESULTS_READY: &str = "screener_results_ready_total";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and expose a static gauge with the
    /// configured poll interval.
    pub fn init(poll_interval_ms: u64) -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        gauge!("screener_poll_interval_ms").set(poll_interval_ms as f64);

        Self { handle }
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
