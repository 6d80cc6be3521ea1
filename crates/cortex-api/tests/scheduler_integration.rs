//! End-to-end coverage of the external scheduler HTTP boundary: request
//! decoding, admission, pipeline dispatch, and decision recording, driven
//! through the real `axum::Router` rather than calling engine/controller
//! APIs directly. Mirrors the seed scenarios in spec.md §8.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cortex_api::app;
use cortex_config::pipeline::{PipelineKind, PipelineSpec};
use cortex_config::settings::RetryPolicy;
use cortex_config::step::{ParamValue, StepSpec};
use cortex_config::SchedulingDomain;
use cortex_controller::Controller;
use cortex_decisions::{DecisionStore, InMemoryDecisionStore};
use cortex_engine::Engine;
use cortex_knowledge::KnowledgeStore;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn bare_pipeline(name: &str) -> PipelineSpec {
    PipelineSpec {
        name: name.to_string(),
        domain: SchedulingDomain::Compute,
        kind: PipelineKind::FilterWeigher,
        description: None,
        ignore_preselection: false,
        create_decisions: true,
        filters: vec![],
        weighers: vec![],
        detectors: vec![],
        detect_interval: Duration::from_secs(300),
    }
}

fn step(uses: &str, params: &[(&str, ParamValue)]) -> StepSpec {
    let mut map = BTreeMap::new();
    for (k, v) in params {
        map.insert((*k).to_string(), v.clone());
    }
    StepSpec {
        uses: uses.to_string(),
        name: None,
        params: map,
        optional: false,
    }
}

/// A harness wiring a fresh knowledge store, engine, controller, and
/// in-memory decision store behind the real HTTP router.
struct Harness {
    router: axum::Router,
    decisions: Arc<InMemoryDecisionStore>,
    controller: Arc<Controller>,
    knowledge: Arc<KnowledgeStore>,
    cancel: CancellationToken,
}

impl Harness {
    fn new(knowledge_names: impl IntoIterator<Item = String>) -> Self {
        let knowledge = Arc::new(KnowledgeStore::new(knowledge_names));
        let engine = Arc::new(Engine::new(knowledge.clone()));
        let controller = Controller::new(engine, knowledge.clone());
        let decisions = Arc::new(InMemoryDecisionStore::new(16));
        let decisions_dyn: Arc<dyn DecisionStore> = decisions.clone();
        let router = app(controller.clone(), decisions_dyn, RetryPolicy::default(), Duration::from_secs(5));
        Self {
            router,
            decisions,
            controller,
            knowledge,
            cancel: CancellationToken::new(),
        }
    }

    fn load(&self, spec: PipelineSpec) {
        self.controller.upsert(spec, &self.cancel).unwrap();
    }

    async fn post(&self, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/scheduler/compute/external")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

fn hosts_request(hosts: &[&str], weights: &[(&str, f64)]) -> Value {
    json!({
        "spec": {},
        "hosts": hosts.iter().map(|h| json!({"host_id": h})).collect::<Vec<_>>(),
        "weights": weights.iter().cloned().collect::<std::collections::HashMap<_, _>>(),
    })
}

/// Seed scenario 1: identity pipeline, unit weights. Ties break
/// lexicographically on host id.
#[tokio::test]
async fn identity_pipeline_ties_break_on_host_id() {
    let harness = Harness::new([]);
    harness.load(bare_pipeline("nova-external-scheduler"));

    let body = hosts_request(&["C", "A", "B"], &[("A", 1.0), ("B", 1.0), ("C", 1.0)]);
    let (status, response) = harness.post(body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["hosts"], json!(["A", "B", "C"]));
}

/// Seed scenario 2: a single weigher ranks by its normalized activation.
#[tokio::test]
async fn single_weigher_ranks_by_normalized_activation() {
    let harness = Harness::new(["scores".to_string()]);
    let mut data = std::collections::HashMap::new();
    data.insert("A".to_string(), json!(2.0));
    data.insert("B".to_string(), json!(5.0));
    data.insert("C".to_string(), json!(3.0));
    harness.knowledge.publish("scores", data).unwrap();

    let mut spec = bare_pipeline("single-weigher");
    spec.weighers.push(step("knowledge-weigher", &[("knowledge", ParamValue::String("scores".to_string()))]));
    harness.load(spec);

    let body = json!({
        "spec": {},
        "hosts": [{"host_id": "A"}, {"host_id": "B"}, {"host_id": "C"}],
        "weights": {"A": 1.0, "B": 1.0, "C": 1.0},
        "pipeline": "single-weigher",
    });
    let (status, response) = harness.post(body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["hosts"], json!(["B", "C", "A"]));
}

/// Seed scenario 3: a filter drops a candidate before the weigher runs.
#[tokio::test]
async fn filter_then_weigher_narrows_and_ranks() {
    let harness = Harness::new(["scores".to_string()]);
    let mut data = std::collections::HashMap::new();
    data.insert("A".to_string(), json!(2.0));
    data.insert("B".to_string(), json!(5.0));
    data.insert("C".to_string(), json!(3.0));
    harness.knowledge.publish("scores", data).unwrap();

    let mut spec = bare_pipeline("filter-then-weigh");
    spec.filters.push(step(
        "knowledge-threshold-filter",
        &[
            ("knowledge", ParamValue::String("scores".to_string())),
            ("threshold", ParamValue::Float(4.0)),
            ("admit-when-missing", ParamValue::Bool(false)),
        ],
    ));
    spec.weighers.push(step("knowledge-weigher", &[("knowledge", ParamValue::String("scores".to_string()))]));
    harness.load(spec);

    let body = json!({
        "spec": {},
        "hosts": [{"host_id": "A"}, {"host_id": "B"}, {"host_id": "C"}],
        "weights": {"A": 1.0, "B": 1.0, "C": 1.0},
        "pipeline": "filter-then-weigh",
    });
    let (status, response) = harness.post(body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["hosts"], json!(["C", "A"]));
}

/// Seed scenario 4: a filter that empties the candidate set fails the run
/// with a 500 and records a `Failed` decision.
#[tokio::test]
async fn filter_emptying_the_set_fails_and_records() {
    let harness = Harness::new(["scores".to_string()]);
    harness.knowledge.publish("scores", std::collections::HashMap::new()).unwrap();

    let mut spec = bare_pipeline("strict");
    spec.filters.push(step(
        "knowledge-threshold-filter",
        &[
            ("knowledge", ParamValue::String("scores".to_string())),
            ("threshold", ParamValue::Float(0.0)),
            ("admit-when-missing", ParamValue::Bool(false)),
        ],
    ));
    harness.load(spec);

    let body = hosts_request(&["A"], &[("A", 1.0)]);
    let (status, _response) = harness.post(body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let history = harness.decisions.history("strict", 10).await;
    assert_eq!(history.len(), 1);
    assert!(matches!(history[0].status, cortex_decisions::DecisionStatus::Failed { .. }));
}

/// Seed scenario 5: consecutive requests for the same resource id get
/// monotonically increasing precedence, each linked to the one before it.
#[tokio::test]
async fn precedence_increments_across_requests_for_the_same_resource() {
    let harness = Harness::new([]);
    harness.load(bare_pipeline("nova-external-scheduler"));

    let mut previous_id = None;
    for precedence in 0..3u64 {
        let body = json!({
            "spec": {"resource_id": "instance-x"},
            "hosts": [{"host_id": "A"}],
            "weights": {"A": 1.0},
        });
        let (status, _response) = harness.post(body).await;
        assert_eq!(status, StatusCode::OK);

        let record = harness.decisions.latest_for_resource("instance-x").await.unwrap();
        assert_eq!(record.precedence, precedence);
        assert_eq!(record.previous_record_id, previous_id);
        previous_id = Some(record.id);
    }
}

/// Seed scenario 6: a pipeline whose knowledge dependency never published
/// answers 503 rather than dispatching a run.
#[tokio::test]
async fn pipeline_not_ready_returns_503() {
    let harness = Harness::new(["host-cpu-usage".to_string()]);
    let mut spec = bare_pipeline("needs-cpu");
    spec.filters.push(step(
        "knowledge-threshold-filter",
        &[
            ("knowledge", ParamValue::String("host-cpu-usage".to_string())),
            ("threshold", ParamValue::Float(0.9)),
        ],
    ));
    harness.load(spec);

    let body = hosts_request(&["A"], &[("A", 1.0)]);
    let (status, response) = harness.post(body).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(response["error"].as_str().unwrap().contains("not ready"));
}

/// A weight map that disagrees with the candidate set is a 400, not a 500.
#[tokio::test]
async fn mismatched_weights_are_a_bad_request() {
    let harness = Harness::new([]);
    harness.load(bare_pipeline("nova-external-scheduler"));

    let body = hosts_request(&["A", "B"], &[("A", 1.0)]);
    let (status, _response) = harness.post(body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// An unknown scheduling domain in the path is a 400, not a panic.
#[tokio::test]
async fn unknown_domain_is_a_bad_request() {
    let harness = Harness::new([]);
    let request = Request::builder()
        .method("POST")
        .uri("/scheduler/quantum-foam/external")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&hosts_request(&["A"], &[("A", 1.0)])).unwrap()))
        .unwrap();
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// A GET against the scheduler path is a 405, not a silent 404.
#[tokio::test]
async fn wrong_method_is_not_allowed() {
    let harness = Harness::new([]);
    let request = Request::builder()
        .method("GET")
        .uri("/scheduler/compute/external")
        .body(Body::empty())
        .unwrap();
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

/// `/readyz` reflects whether every loaded pipeline is ready.
#[tokio::test]
async fn readyz_reports_503_while_a_pipeline_is_unready() {
    let harness = Harness::new(["host-cpu-usage".to_string()]);
    let mut spec = bare_pipeline("needs-cpu");
    spec.filters.push(step(
        "knowledge-threshold-filter",
        &[("knowledge", ParamValue::String("host-cpu-usage".to_string())), ("threshold", ParamValue::Float(0.9))],
    ));
    harness.load(spec);

    let request = Request::builder().method("GET").uri("/readyz").body(Body::empty()).unwrap();
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    harness.knowledge.publish("host-cpu-usage", std::collections::HashMap::new()).unwrap();
    for _ in 0..50 {
        if harness.controller.is_ready("needs-cpu") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let request = Request::builder().method("GET").uri("/readyz").body(Body::empty()).unwrap();
    let response = harness.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// `sandbox: true` computes a ranking but never persists a decision, even
/// though the pipeline's `create-decisions` flag is set.
#[tokio::test]
async fn sandbox_flag_skips_decision_recording() {
    let harness = Harness::new([]);
    harness.load(bare_pipeline("nova-external-scheduler"));

    let mut body = hosts_request(&["A"], &[("A", 1.0)]);
    body["flags"] = json!({"sandbox": true});
    let (status, response) = harness.post(body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["hosts"], json!(["A"]));
    assert!(harness.decisions.history("nova-external-scheduler", 10).await.is_empty());
}
