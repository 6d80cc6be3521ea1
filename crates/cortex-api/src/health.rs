//! Global health and status endpoints.
//!
//! - GET `/status` — every pipeline's current conditions
//! - GET `/livez` — liveness probe (process is up and serving)
//! - GET `/readyz` — readiness probe (every loaded pipeline is `Ready`)

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use cortex_config::condition::{Condition, ConditionKind};
use serde::Serialize;
use std::collections::HashMap;

/// Registers the shared admin routes.
pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(show_status))
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    generated_at: String,
    pipelines: HashMap<String, Vec<Condition>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeResponse {
    probe: &'static str,
    status: &'static str,
    generated_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    not_ready: Vec<String>,
}

async fn show_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        generated_at: Utc::now().to_rfc3339(),
        pipelines: state.controller.statuses(),
    })
}

async fn livez() -> (StatusCode, Json<ProbeResponse>) {
    (StatusCode::OK, Json(ProbeResponse::ok("livez")))
}

async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<ProbeResponse>) {
    let statuses = state.controller.statuses();
    let not_ready: Vec<String> = statuses
        .into_iter()
        .filter(|(_, conditions)| {
            !conditions
                .iter()
                .any(|c| c.kind == ConditionKind::Ready && c.is_true())
        })
        .map(|(name, _)| name)
        .collect();

    if not_ready.is_empty() {
        (StatusCode::OK, Json(ProbeResponse::ok("readyz")))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(ProbeResponse::fail("readyz", not_ready)))
    }
}

impl ProbeResponse {
    fn ok(probe: &'static str) -> Self {
        Self {
            probe,
            status: "ok",
            generated_at: Utc::now().to_rfc3339(),
            not_ready: Vec::new(),
        }
    }

    fn fail(probe: &'static str, not_ready: Vec<String>) -> Self {
        Self {
            probe,
            status: "failed",
            generated_at: Utc::now().to_rfc3339(),
            not_ready,
        }
    }
}
