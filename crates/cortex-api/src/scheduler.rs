//! The external scheduler request handler: `POST /scheduler/{domain}/external`.

use crate::error::Error;
use crate::AppState;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use cortex_config::SchedulingDomain;
use cortex_decisions::{DecisionRecord, DecisionStatus};
use cortex_engine::{Candidate, SchedulingRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Registers the `/scheduler/{domain}/external` route.
pub(crate) fn routes() -> Router<AppState> {
    Router::new().route("/scheduler/{domain}/external", post(handle_request))
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ExternalRequest {
    #[serde(default)]
    spec: Value,
    hosts: Vec<HostEntry>,
    #[serde(default)]
    weights: HashMap<String, f64>,
    #[serde(default)]
    pipeline: Option<String>,
    #[serde(default)]
    flags: RequestFlags,
}

#[derive(Debug, Deserialize, Serialize)]
struct HostEntry {
    host_id: String,
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RequestFlags {
    /// Accepted for wire compatibility; this implementation never forces a
    /// synchronous pipeline rebuild from the request path — rebuilding is
    /// the controller's job, driven by spec/knowledge changes.
    #[serde(default)]
    #[allow(dead_code)]
    rebuild: bool,
    #[serde(default)]
    ignore_preselection: bool,
    /// When `true`, the decision is computed and returned but never recorded,
    /// regardless of the pipeline's `create-decisions` flag.
    #[serde(default)]
    sandbox: bool,
}

#[derive(Serialize)]
struct ExternalResponse {
    hosts: Vec<String>,
}

async fn handle_request(
    State(state): State<AppState>,
    Path(domain_segment): Path<String>,
    Json(request): Json<ExternalRequest>,
) -> Result<Json<ExternalResponse>, Error> {
    let domain = SchedulingDomain::from_path_segment(&domain_segment).ok_or_else(|| Error::UnknownDomain {
        segment: domain_segment.clone(),
    })?;

    let name = request
        .pipeline
        .clone()
        .unwrap_or_else(|| domain.default_pipeline_name().to_string());

    let spec = state.controller.spec(&name).ok_or_else(|| Error::UnknownPipeline { name: name.clone() })?;
    if !state.controller.is_ready(&name) {
        return Err(Error::PipelineNotReady { name });
    }

    let candidates: Vec<Candidate> = request
        .hosts
        .iter()
        .map(|h| Candidate {
            host_id: h.host_id.clone(),
            attributes: Value::Object(h.attributes.clone()),
        })
        .collect();

    let engine_request = SchedulingRequest {
        domain,
        pipeline_name: Some(name.clone()),
        candidates,
        weights: request.weights.clone(),
        ignore_preselection: request.flags.ignore_preselection,
    };

    let resource_id = extract_resource_id(&request.spec);
    let raw_request = serde_json::to_value(&request).unwrap_or(Value::Null);

    let started = Instant::now();
    let outcome = run_with_timeout(&state, engine_request, state.request_timeout).await;
    let elapsed = started.elapsed();

    let should_record = spec.create_decisions && !request.flags.sandbox;

    match outcome {
        Ok(outcome) => {
            let hosts: Vec<String> = outcome.ranked.iter().map(|c| c.host_id.clone()).collect();
            if should_record {
                let record = build_record(
                    DecisionStatus::Ready,
                    name,
                    domain,
                    resource_id,
                    raw_request,
                    outcome.raw_in_weights,
                    outcome.normalized_in_weights,
                    outcome.step_results,
                    outcome.ranked,
                    elapsed,
                );
                record_decision(&state, record).await;
            }
            Ok(Json(ExternalResponse { hosts }))
        }
        Err(e) => {
            let api_err = Error::from(e);
            if matches!(api_err, Error::FilterEmptiedSet { .. } | Error::Internal { .. }) {
                crate::metrics::record_component_error("scheduler");
            }
            if should_record {
                if let Error::FilterEmptiedSet { .. } = &api_err {
                    let record = build_record(
                        DecisionStatus::Failed {
                            reason: "FilterEmptiedSet".to_string(),
                        },
                        name,
                        domain,
                        resource_id,
                        raw_request,
                        HashMap::new(),
                        HashMap::new(),
                        Vec::new(),
                        Vec::new(),
                        elapsed,
                    );
                    record_decision(&state, record).await;
                }
            }
            Err(api_err)
        }
    }
}

async fn run_with_timeout(
    state: &AppState,
    request: SchedulingRequest,
    timeout: Duration,
) -> Result<cortex_engine::DecisionOutcome, cortex_engine::Error> {
    let cancel = CancellationToken::new();
    let run = state.controller.engine().run(request, &cancel);
    match tokio::time::timeout(timeout, run).await {
        Ok(result) => result,
        Err(_) => {
            cancel.cancel();
            Err(cortex_engine::Error::Cancelled)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_record(
    status: DecisionStatus,
    pipeline: String,
    domain: SchedulingDomain,
    resource_id: Option<String>,
    raw_request: Value,
    raw_in_weights: HashMap<String, f64>,
    normalized_in_weights: HashMap<String, f64>,
    step_results: Vec<cortex_engine::StepResult>,
    ranked: Vec<cortex_engine::RankedCandidate>,
    elapsed: Duration,
) -> DecisionRecord {
    let chosen_host = ranked.first().map(|c| c.host_id.clone());
    DecisionRecord {
        id: uuid::Uuid::now_v7(),
        pipeline,
        domain,
        resource_id,
        raw_request,
        raw_in_weights,
        normalized_in_weights,
        step_results,
        ranked,
        chosen_host,
        status,
        precedence: 0,
        previous_record_id: None,
        elapsed,
        recorded_at: chrono::Utc::now(),
    }
}

async fn record_decision(state: &AppState, record: DecisionRecord) {
    // `precedence`/`previous_record_id` on `record` are placeholders; the
    // store assigns the real values atomically per resource-id (see
    // `DecisionStore::record`).
    if let Err(e) = cortex_decisions::record_with_retry(state.decisions.as_ref(), record, &state.decision_retry).await {
        tracing::error!(error = %e, "failed to persist decision record after every retry");
        crate::metrics::record_component_error("decisions");
    }
}

/// Looks for a top-level `resource_id` string field in the request's opaque
/// `spec` payload. No fixed wire contract names this field consistently
/// across domains, so this is a best-effort heuristic, not a guarantee.
fn extract_resource_id(spec: &Value) -> Option<String> {
    spec.as_object()?.get("resource_id")?.as_str().map(str::to_string)
}
