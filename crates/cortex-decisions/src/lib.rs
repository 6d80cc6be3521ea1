//! Decision recording: persists the outcome of every scheduling decision
//! for audit and later analysis, at least once, with retry-with-backoff
//! against transient storage failures.

pub mod error;

pub use error::Error;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cortex_config::settings::RetryPolicy;
use cortex_config::SchedulingDomain;
use cortex_engine::{RankedCandidate, StepResult};
pub use cortex_engine::normalize_weights;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use uuid::Uuid;

/// Whether a decision completed normally or failed partway through.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionStatus {
    /// The pipeline produced a ranked candidate list.
    Ready,
    /// The pipeline failed before producing a ranking.
    Failed {
        /// A short machine-readable reason, e.g. `"FilterEmptiedSet"`.
        reason: String,
    },
}

/// A single recorded scheduling decision.
///
/// Mirrors the fields the calling control plane (and an operator debugging
/// a placement) needs after the fact: what was asked, how the inputs were
/// normalized, what came out, and where this decision sits in the history
/// of decisions for the same resource.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    /// A unique id for this decision, assigned at recording time.
    pub id: Uuid,
    /// The pipeline that produced this decision.
    pub pipeline: String,
    /// The scheduling domain the decision was for.
    pub domain: SchedulingDomain,
    /// The resource the request named, if any (e.g. an instance id being
    /// (re)scheduled).
    pub resource_id: Option<String>,
    /// The request body as received, for audit.
    pub raw_request: serde_json::Value,
    /// The request's input weight map, before normalization.
    pub raw_in_weights: HashMap<String, f64>,
    /// The input weight map after zero-mean/unit-range normalization
    /// (or all-zero, when every input weight was equal).
    pub normalized_in_weights: HashMap<String, f64>,
    /// Every weigher's per-candidate activation, in pipeline order. Empty
    /// when `status` is `Failed`.
    pub step_results: Vec<StepResult>,
    /// The ranked candidate list the pipeline produced, best first. Empty
    /// when `status` is `Failed`.
    pub ranked: Vec<RankedCandidate>,
    /// The host ultimately chosen by the upstream caller, if reported back
    /// (Cortex ranks; the calling control plane makes the final choice and
    /// may report it via a follow-up call). Defaults to the top-ranked host.
    pub chosen_host: Option<String>,
    /// Whether the pipeline run succeeded.
    pub status: DecisionStatus,
    /// How many prior decisions exist for the same `resource_id`.
    pub precedence: u64,
    /// The id of the previous decision for the same `resource_id`, if any.
    pub previous_record_id: Option<Uuid>,
    /// Wall-clock time the pipeline run took.
    pub elapsed: Duration,
    /// When this decision was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl DecisionRecord {
    /// Builds a record for a plain ranked outcome, with no resource
    /// tracking or weight bookkeeping. Convenient for tests and for
    /// internal (non-admission-path) decisions.
    #[must_use]
    pub fn new(pipeline: String, domain: SchedulingDomain, ranked: Vec<RankedCandidate>) -> Self {
        let chosen_host = ranked.first().map(|c| c.host_id.clone());
        Self {
            id: Uuid::now_v7(),
            pipeline,
            domain,
            resource_id: None,
            raw_request: serde_json::Value::Null,
            raw_in_weights: HashMap::new(),
            normalized_in_weights: HashMap::new(),
            step_results: Vec::new(),
            ranked,
            chosen_host,
            status: DecisionStatus::Ready,
            precedence: 0,
            previous_record_id: None,
            elapsed: Duration::ZERO,
            recorded_at: Utc::now(),
        }
    }

    /// The first (best-ranked) host, or `None` if the decision failed
    /// before producing any ranking.
    #[must_use]
    pub fn target_host(&self) -> Option<&str> {
        self.ranked.first().map(|c| c.host_id.as_str())
    }
}

/// Persists [`DecisionRecord`]s. Implementations may be backed by memory,
/// a database, or a remote audit service; the engine only depends on this
/// trait, never on a concrete store.
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Persists `record`. When `record.resource_id` is `Some`, implementations
    /// must assign `record.precedence`/`record.previous_record_id` relative to
    /// the latest existing record for that resource — overwriting whatever
    /// the caller set — and must do so as a single atomic read-modify-write
    /// per resource-id, so that two decisions recorded concurrently for the
    /// same resource never observe (or assign) the same precedence.
    /// Implementations should also treat this as idempotent on `record.id`
    /// so [`record_with_retry`] can safely retry a write whose result is
    /// uncertain (e.g. a timed-out network call).
    async fn record(&self, record: DecisionRecord) -> Result<(), Error>;

    /// Returns the most recent records for `pipeline`, newest first, up to
    /// `limit`.
    async fn history(&self, pipeline: &str, limit: usize) -> Vec<DecisionRecord>;

    /// Returns the most recently recorded decision for `resource_id`, used
    /// to compute the next record's `precedence`/`previous_record_id`.
    async fn latest_for_resource(&self, resource_id: &str) -> Option<DecisionRecord>;
}

/// Records `record` against `store`, retrying transient failures according
/// to `policy` before giving up.
///
/// # Errors
/// Returns [`Error::RecordFailed`] if every attempt fails.
pub async fn record_with_retry(
    store: &dyn DecisionStore,
    record: DecisionRecord,
    policy: &RetryPolicy,
) -> Result<(), Error> {
    let mut attempt = 1;
    loop {
        match store.record(record.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= policy.max_attempts => {
                return Err(Error::RecordFailed {
                    attempts: attempt,
                    details: e.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "decision record attempt failed, retrying");
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
        }
    }
}

/// An in-memory [`DecisionStore`], bounded per pipeline by a capacity.
/// Suitable as the default store and for tests; a production deployment
/// typically supplies its own [`DecisionStore`] backed by durable storage.
pub struct InMemoryDecisionStore {
    capacity: usize,
    by_pipeline: RwLock<HashMap<String, VecDeque<DecisionRecord>>>,
    by_resource: RwLock<HashMap<String, DecisionRecord>>,
}

impl InMemoryDecisionStore {
    /// Builds a store retaining up to `capacity` records per pipeline.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            by_pipeline: RwLock::new(HashMap::new()),
            by_resource: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl DecisionStore for InMemoryDecisionStore {
    async fn record(&self, mut record: DecisionRecord) -> Result<(), Error> {
        if let Some(resource_id) = record.resource_id.clone() {
            // A single write-lock critical section spans the read of the
            // previous record and the insert of this one, so two concurrent
            // callers for the same resource-id can never both observe the
            // same "previous" record and assign it the same precedence.
            let mut by_resource = self.by_resource.write();
            if let Some(previous) = by_resource.get(&resource_id) {
                record.precedence = previous.precedence + 1;
                record.previous_record_id = Some(previous.id);
            } else {
                record.precedence = 0;
                record.previous_record_id = None;
            }
            let _prev = by_resource.insert(resource_id, record.clone());
        }

        let mut by_pipeline = self.by_pipeline.write();
        let queue = by_pipeline.entry(record.pipeline.clone()).or_default();
        queue.push_front(record);
        while queue.len() > self.capacity {
            let _evicted = queue.pop_back();
        }
        Ok(())
    }

    async fn history(&self, pipeline: &str, limit: usize) -> Vec<DecisionRecord> {
        self.by_pipeline
            .read()
            .get(pipeline)
            .map(|queue| queue.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    async fn latest_for_resource(&self, resource_id: &str) -> Option<DecisionRecord> {
        self.by_resource.read().get(resource_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(pipeline: &str) -> DecisionRecord {
        DecisionRecord::new(pipeline.to_string(), SchedulingDomain::Compute, vec![])
    }

    #[tokio::test]
    async fn history_returns_newest_first_bounded_by_capacity() {
        let store = InMemoryDecisionStore::new(2);
        for _ in 0..3 {
            store.record(sample_record("p")).await.unwrap();
        }
        let history = store.history("p", 10).await;
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn latest_for_resource_tracks_the_most_recent_write() {
        let store = InMemoryDecisionStore::new(10);
        let mut first = sample_record("p");
        first.resource_id = Some("instance-1".to_string());
        store.record(first.clone()).await.unwrap();

        let mut second = sample_record("p");
        second.resource_id = Some("instance-1".to_string());
        store.record(second.clone()).await.unwrap();

        let latest = store.latest_for_resource("instance-1").await.unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.precedence, 1);
        assert_eq!(latest.previous_record_id, Some(first.id));
    }

    #[tokio::test]
    async fn record_assigns_precedence_itself_ignoring_the_caller_supplied_value() {
        let store = InMemoryDecisionStore::new(10);
        let mut record = sample_record("p");
        record.resource_id = Some("instance-1".to_string());
        record.precedence = 99;
        store.record(record).await.unwrap();

        let latest = store.latest_for_resource("instance-1").await.unwrap();
        assert_eq!(latest.precedence, 0);
    }

    #[tokio::test]
    async fn concurrent_records_for_the_same_resource_never_tie_on_precedence() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryDecisionStore::new(100));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut record = sample_record("p");
                record.resource_id = Some("instance-1".to_string());
                store.record(record).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let history: Vec<_> = store
            .by_pipeline
            .read()
            .get("p")
            .map(|queue| queue.iter().map(|r| r.precedence).collect())
            .unwrap_or_default();
        let mut precedences = history.clone();
        precedences.sort_unstable();
        precedences.dedup();
        assert_eq!(precedences.len(), history.len(), "every recorded precedence must be unique");
    }

    #[test]
    fn normalize_weights_is_all_zero_when_every_weight_is_equal() {
        let weights = HashMap::from([("a".to_string(), 1.0), ("b".to_string(), 1.0)]);
        let normalized = normalize_weights(&weights);
        assert!(normalized.values().all(|v| v.abs() < f64::EPSILON));
    }

    #[test]
    fn normalize_weights_centers_on_zero_mean() {
        let weights = HashMap::from([("a".to_string(), 1.0), ("b".to_string(), 3.0)]);
        let normalized = normalize_weights(&weights);
        assert!((normalized["a"] - -0.5).abs() < 1e-9);
        assert!((normalized["b"] - 0.5).abs() < 1e-9);
    }

    struct FlakyStore {
        failures_remaining: std::sync::atomic::AtomicU32,
        inner: InMemoryDecisionStore,
    }

    #[async_trait]
    impl DecisionStore for FlakyStore {
        async fn record(&self, record: DecisionRecord) -> Result<(), Error> {
            use std::sync::atomic::Ordering;
            if self.failures_remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n > 0 { Some(n - 1) } else { None }
            }).is_ok() {
                return Err(Error::RecordFailed {
                    attempts: 1,
                    details: "simulated transient failure".to_string(),
                });
            }
            self.inner.record(record).await
        }

        async fn history(&self, pipeline: &str, limit: usize) -> Vec<DecisionRecord> {
            self.inner.history(pipeline, limit).await
        }

        async fn latest_for_resource(&self, resource_id: &str) -> Option<DecisionRecord> {
            self.inner.latest_for_resource(resource_id).await
        }
    }

    #[tokio::test]
    async fn record_with_retry_succeeds_after_transient_failures() {
        let store = FlakyStore {
            failures_remaining: std::sync::atomic::AtomicU32::new(2),
            inner: InMemoryDecisionStore::new(10),
        };
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(5),
        };
        record_with_retry(&store, sample_record("p"), &policy).await.unwrap();
        assert_eq!(store.history("p", 10).await.len(), 1);
    }

    #[tokio::test]
    async fn record_with_retry_gives_up_after_max_attempts() {
        let store = FlakyStore {
            failures_remaining: std::sync::atomic::AtomicU32::new(100),
            inner: InMemoryDecisionStore::new(10),
        };
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(2),
        };
        let err = record_with_retry(&store, sample_record("p"), &policy).await.unwrap_err();
        assert!(matches!(err, Error::RecordFailed { attempts: 3, .. }));
    }
}
