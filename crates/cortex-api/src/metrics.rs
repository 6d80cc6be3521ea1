//! Prometheus metrics endpoint: `GET /metrics`.
//!
//! Mirrors the teacher admin crate's `/telemetry/metrics` endpoint, but
//! backed directly by the `prometheus` crate's default registry rather than
//! a bespoke telemetry-registry abstraction, since Cortex has no multi-pipe
//! dataflow telemetry tree to generalize over.

use crate::AppState;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};
use std::sync::OnceLock;

static COMPONENT_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

fn component_errors() -> &'static IntCounterVec {
    COMPONENT_ERRORS.get_or_init(|| {
        let opts = Opts::new(
            "cortex_component_errors_total",
            "Total errors observed per Cortex component.",
        );
        let counter = IntCounterVec::new(opts, &["component"]).expect("static metric descriptor is valid");
        prometheus::register(Box::new(counter.clone())).expect("metric registered exactly once");
        counter
    })
}

/// Increments the per-component error counter (§7: "per-component error
/// metric"), registering it with the default registry on first use.
pub(crate) fn record_component_error(component: &str) {
    component_errors().with_label_values(&[component]).inc();
}

/// Registers the `/metrics` route.
pub(crate) fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(export_metrics))
}

async fn export_metrics() -> Response {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode prometheus metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(header::CONTENT_TYPE, encoder.format_type())], buffer).into_response()
}
