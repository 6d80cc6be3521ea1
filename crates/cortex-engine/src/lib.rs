//! The pipeline execution engine: runs a scheduling request through a
//! loaded pipeline's filters and weighers and returns a ranked candidate
//! list.
//!
//! Pipelines are swapped in and out by the controller as it reconciles
//! declarative specs; this crate only knows how to run whatever is
//! currently loaded. Reads of the loaded-pipeline map never block a
//! concurrent reconciliation swap ([`arc_swap::ArcSwap`]); a per-pipeline
//! `tokio::sync::Mutex` serializes runs of the *same* pipeline so that a
//! reconciliation swap cannot interleave with a run already using the
//! previous version's steps.

pub mod error;

pub use error::Error;
pub use cortex_registry::{Candidate, Finding, StepContext};

use arc_swap::ArcSwap;
use cortex_config::SchedulingDomain;
use cortex_registry::ResolvedPipeline;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A scheduling request: the domain and candidate set to admit and rank.
#[derive(Debug, Clone)]
pub struct SchedulingRequest {
    /// The scheduling domain this request is for.
    pub domain: SchedulingDomain,
    /// The pipeline to run; falls back to the domain's default pipeline
    /// name when absent.
    pub pipeline_name: Option<String>,
    /// Candidates preselected by the caller (e.g. Nova's own feasibility
    /// filtering before calling out to the external scheduler).
    pub candidates: Vec<Candidate>,
    /// The caller's input weight for each candidate. Must cover exactly the
    /// same host ids as `candidates`, unless `ignore_preselection` is set
    /// (in which case the engine discards both in favor of its own
    /// candidate gatherer and the admission check is skipped).
    pub weights: HashMap<String, f64>,
    /// Request-level override of the pipeline's own `ignore-preselection`
    /// flag; bypassing preselection is in effect if either is `true`.
    pub ignore_preselection: bool,
}

/// A single candidate's rank in a [`DecisionOutcome`].
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    /// The candidate's host id.
    pub host_id: String,
    /// The candidate's total, post-normalization score. Higher ranks
    /// better.
    pub score: f64,
}

/// One weigher's per-candidate contribution to a [`DecisionOutcome`],
/// normalized to `[0, 1]` but *before* that weigher's multiplier is
/// applied, so a decision record can show exactly what each step
/// contributed regardless of how pipeline authors tuned multipliers.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The weigher step's display name.
    pub step: String,
    /// This step's normalized (pre-multiplier) score for every ranked
    /// candidate.
    pub activations: HashMap<String, f64>,
}

/// The result of running a [`SchedulingRequest`] through a pipeline.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    /// The pipeline that produced this outcome.
    pub pipeline: String,
    /// The request's input weights, as supplied, restricted to candidates
    /// that survived filtering.
    pub raw_in_weights: HashMap<String, f64>,
    /// [`normalize_weights`] applied to `raw_in_weights`, over the
    /// surviving candidate set.
    pub normalized_in_weights: HashMap<String, f64>,
    /// Every weigher's per-candidate activation, in pipeline order.
    pub step_results: Vec<StepResult>,
    /// Candidates that survived filtering, ranked best-first.
    pub ranked: Vec<RankedCandidate>,
}

/// Enumerates every feasible candidate for a domain, used only when a
/// pipeline sets `ignore-preselection` and therefore cannot rely on the
/// caller's own candidate list.
pub trait CandidateGatherer: Send + Sync {
    /// Returns every candidate currently feasible for `domain`.
    fn gather(&self, domain: SchedulingDomain) -> Vec<Candidate>;
}

struct LoadedPipeline {
    resolved: ResolvedPipeline,
    run_lock: tokio::sync::Mutex<()>,
}

type PipelineMap = HashMap<String, Arc<LoadedPipeline>>;

/// The runtime engine: holds the currently loaded pipelines and the
/// knowledge store they query.
pub struct Engine {
    knowledge: Arc<cortex_knowledge::KnowledgeStore>,
    pipelines: ArcSwap<PipelineMap>,
    gatherers: HashMap<SchedulingDomain, Arc<dyn CandidateGatherer>>,
}

impl Engine {
    /// Builds an engine with no pipelines loaded and no candidate
    /// gatherers registered.
    #[must_use]
    pub fn new(knowledge: Arc<cortex_knowledge::KnowledgeStore>) -> Self {
        Self {
            knowledge,
            pipelines: ArcSwap::from_pointee(HashMap::new()),
            gatherers: HashMap::new(),
        }
    }

    /// Registers a candidate gatherer for `domain`, replacing any previous
    /// one.
    pub fn register_gatherer(&mut self, domain: SchedulingDomain, gatherer: Arc<dyn CandidateGatherer>) {
        let _prev = self.gatherers.insert(domain, gatherer);
    }

    /// Loads or replaces the pipeline named by `resolved.spec.name`.
    ///
    /// Existing runs of the previous version finish against their own
    /// cloned `Arc`; only runs starting after this call observe the new
    /// steps.
    pub fn load_pipeline(&self, resolved: ResolvedPipeline) {
        let name = resolved.spec.name.clone();
        let loaded = Arc::new(LoadedPipeline {
            resolved,
            run_lock: tokio::sync::Mutex::new(()),
        });
        self.pipelines.rcu(|current: &PipelineMap| {
            let mut next = current.clone();
            let _prev = next.insert(name.clone(), loaded.clone());
            next
        });
    }

    /// Removes a pipeline by name, if loaded.
    pub fn remove_pipeline(&self, name: &str) {
        self.pipelines.rcu(|current: &PipelineMap| {
            let mut next = current.clone();
            let _removed = next.remove(name);
            next
        });
    }

    /// Returns the names of every currently loaded pipeline.
    #[must_use]
    pub fn pipeline_names(&self) -> Vec<String> {
        self.pipelines.load().keys().cloned().collect()
    }

    /// Returns `true` if `name` is currently loaded (regardless of whether
    /// the controller considers it ready to serve requests).
    #[must_use]
    pub fn has_pipeline(&self, name: &str) -> bool {
        self.pipelines.load().contains_key(name)
    }

    /// Runs every detector in `name`'s pipeline, in declaration order, over
    /// the current knowledge snapshot, returning their combined findings.
    ///
    /// Unlike [`Engine::run`], this does not take the pipeline's run lock:
    /// a detector pipeline answers no caller-facing request to serialize
    /// against, and findings only read the knowledge snapshot. Callers that
    /// run detectors on a schedule (the controller) are responsible for
    /// deciding how to react to a failure; this call simply surfaces it.
    ///
    /// # Errors
    /// Returns [`Error::UnknownPipeline`] if `name` is not loaded, or
    /// [`Error::Step`] if a detector fails.
    pub fn run_detectors(&self, name: &str) -> Result<Vec<Finding>, Error> {
        let loaded = self
            .pipelines
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownPipeline { name: name.to_string() })?;

        let ctx = StepContext { knowledge: &self.knowledge };

        let mut findings = Vec::new();
        for named in &loaded.resolved.detectors {
            findings.extend(named.detector.detect(&ctx)?);
        }
        Ok(findings)
    }

    /// Runs `request` through its named (or default) pipeline, returning a
    /// best-first ranked candidate list.
    ///
    /// # Errors
    /// Returns [`Error::UnknownPipeline`] if the resolved name is not
    /// loaded, [`Error::BadRequest`] if the admission check fails,
    /// [`Error::NoCandidatesAdmitted`] if every candidate was filtered out,
    /// [`Error::NoCandidateGatherer`] if the pipeline bypasses preselection
    /// for a domain with no registered gatherer, [`Error::Internal`] if a
    /// weigher produced a non-finite score, or [`Error::Cancelled`] if
    /// `cancel` fires before the run completes.
    pub async fn run(
        &self,
        request: SchedulingRequest,
        cancel: &CancellationToken,
    ) -> Result<DecisionOutcome, Error> {
        let name = request
            .pipeline_name
            .clone()
            .unwrap_or_else(|| request.domain.default_pipeline_name().to_string());

        let loaded = self
            .pipelines
            .load()
            .get(&name)
            .cloned()
            .ok_or_else(|| Error::UnknownPipeline { name: name.clone() })?;

        let _guard = tokio::select! {
            guard = loaded.run_lock.lock() => guard,
            () = cancel.cancelled() => return Err(Error::Cancelled),
        };

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let ctx = StepContext {
            knowledge: &self.knowledge,
        };

        let bypass_preselection = loaded.resolved.spec.ignore_preselection || request.ignore_preselection;

        let mut candidates = if bypass_preselection {
            let gatherer = self
                .gatherers
                .get(&request.domain)
                .ok_or_else(|| Error::NoCandidateGatherer { pipeline: name.clone() })?;
            gatherer.gather(request.domain)
        } else {
            check_weight_coverage(&request.candidates, &request.weights)?;
            request.candidates
        };

        if candidates.is_empty() {
            return Err(Error::BadRequest {
                reason: "candidate set is empty".to_string(),
            });
        }

        for named in &loaded.resolved.filters {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let mut survivors = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                if named.filter.admit(&candidate, &ctx)? {
                    survivors.push(candidate);
                }
            }
            candidates = survivors;
        }

        if candidates.is_empty() {
            return Err(Error::NoCandidatesAdmitted { pipeline: name });
        }

        let raw_in_weights: HashMap<String, f64> = candidates
            .iter()
            .filter_map(|c| request.weights.get(&c.host_id).map(|w| (c.host_id.clone(), *w)))
            .collect();
        let normalized_in_weights = normalize_weights(&raw_in_weights);

        let (step_results, ranked) =
            weigh_and_rank(&loaded.resolved.weighers, &candidates, &normalized_in_weights, &ctx, cancel)?;

        Ok(DecisionOutcome {
            pipeline: name,
            raw_in_weights,
            normalized_in_weights,
            step_results,
            ranked,
        })
    }
}

/// Validates that `weights` covers exactly the host ids in `candidates`, in
/// both directions (spec.md §3: "every weight key is in the candidate set
/// and every candidate has a weight").
fn check_weight_coverage(candidates: &[Candidate], weights: &HashMap<String, f64>) -> Result<(), Error> {
    let candidate_ids: HashSet<&str> = candidates.iter().map(|c| c.host_id.as_str()).collect();
    let weight_ids: HashSet<&str> = weights.keys().map(String::as_str).collect();

    let missing_weights: Vec<&str> = candidate_ids.difference(&weight_ids).copied().collect();
    let unknown_weights: Vec<&str> = weight_ids.difference(&candidate_ids).copied().collect();

    if missing_weights.is_empty() && unknown_weights.is_empty() {
        return Ok(());
    }

    let mut reason = String::new();
    if !missing_weights.is_empty() {
        reason.push_str(&format!("candidates missing a weight: {missing_weights:?}"));
    }
    if !unknown_weights.is_empty() {
        if !reason.is_empty() {
            reason.push_str("; ");
        }
        reason.push_str(&format!("weights for unknown candidates: {unknown_weights:?}"));
    }
    Err(Error::BadRequest { reason })
}

/// Zero-mean/unit-range normalization of a weight map over its own key set:
/// `(w - mean) / (max - min)`. When every weight is equal (`range == 0`)
/// every host normalizes to `0.0` (spec.md §8: "All input weights equal →
/// raw-in normalization yields all zeros").
#[must_use]
pub fn normalize_weights(weights: &HashMap<String, f64>) -> HashMap<String, f64> {
    if weights.is_empty() {
        return HashMap::new();
    }

    let values: Vec<f64> = weights.values().copied().collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    weights
        .iter()
        .map(|(host, weight)| {
            let normalized = if range.abs() < f64::EPSILON { 0.0 } else { (weight - mean) / range };
            (host.clone(), normalized)
        })
        .collect()
}

fn weigh_and_rank(
    weighers: &[cortex_registry::NamedWeigher],
    candidates: &[Candidate],
    normalized_in_weights: &HashMap<String, f64>,
    ctx: &StepContext<'_>,
    cancel: &CancellationToken,
) -> Result<(Vec<StepResult>, Vec<RankedCandidate>), Error> {
    let mut totals: HashMap<String, f64> = candidates
        .iter()
        .map(|c| (c.host_id.clone(), normalized_in_weights.get(&c.host_id).copied().unwrap_or(0.0)))
        .collect();

    let mut step_results = Vec::with_capacity(weighers.len());

    for named in weighers {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let raw: Vec<f64> = candidates
            .iter()
            .map(|c| named.weigher.weigh(c, ctx))
            .collect::<Result<_, _>>()?;

        for score in &raw {
            if !score.is_finite() {
                return Err(Error::Internal {
                    details: format!("weigher `{}` produced a non-finite score: {score}", named.name),
                });
            }
        }

        let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
        let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let spread = max - min;

        let mut activations = HashMap::with_capacity(candidates.len());
        for (candidate, score) in candidates.iter().zip(raw.iter()) {
            let normalized = if spread.abs() < f64::EPSILON { 0.5 } else { (score - min) / spread };
            *totals.get_mut(&candidate.host_id).expect("totals seeded from candidates") += normalized * named.weigher.multiplier();
            let _prev = activations.insert(candidate.host_id.clone(), normalized);
        }
        step_results.push(StepResult {
            step: named.name.clone(),
            activations,
        });
    }

    let mut ranked: Vec<RankedCandidate> = candidates
        .iter()
        .map(|candidate| RankedCandidate {
            host_id: candidate.host_id.clone(),
            score: totals[&candidate.host_id],
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.host_id.cmp(&b.host_id))
    });

    Ok((step_results, ranked))
}
