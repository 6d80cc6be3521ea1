//! The step registry: resolves declarative [`cortex_config::step::StepSpec`]
//! references into constructed, runnable step implementations.
//!
//! Built-in steps register themselves in [`builtin_factories`], a
//! process-wide map populated once on first use. This mirrors a classic
//! plugin registry: each implementation advertises a stable string key, a
//! [`StepKind`], and a constructor; the registry itself knows nothing about
//! any specific step's semantics.

pub mod error;
pub mod steps;

pub use error::Error;

use cortex_config::pipeline::{PipelineKind, PipelineSpec};
use cortex_config::step::StepSpec;
use cortex_knowledge::KnowledgeStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// The kind of step an implementation registers as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Narrows the candidate set; see [`Filter`].
    Filter,
    /// Scores surviving candidates; see [`Weigher`].
    Weigher,
    /// Inspects knowledge on a schedule; see [`Detector`].
    Detector,
}

/// A candidate under consideration by a filter-weigher pipeline: a host (or
/// volume, or share) id plus whatever domain-specific attributes the
/// calling scheduler request carried (flavor, requested size, and so on).
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The candidate's stable identifier.
    pub host_id: String,
    /// Domain-specific attributes the request supplied for this candidate.
    pub attributes: Value,
}

/// A finding emitted by a [`Detector`] run.
#[derive(Debug, Clone)]
pub struct Finding {
    /// The subject the finding is about (typically a host id).
    pub subject: String,
    /// A short machine-readable code, e.g. `"stale-knowledge"`.
    pub code: String,
    /// A human-readable message elaborating the finding.
    pub message: String,
}

/// The context a step runs in: read access to the knowledge store it was
/// constructed to query.
pub struct StepContext<'a> {
    /// The process's knowledge store.
    pub knowledge: &'a KnowledgeStore,
}

/// Failure during a step's `admit`/`weigh`/`detect` call, as opposed to
/// construction failure (which is a [`Error`]).
#[derive(thiserror::Error, Debug)]
#[error("step `{step}` failed: {details}")]
pub struct StepFailure {
    /// The step's display name.
    pub step: String,
    /// Human-readable details of the failure.
    pub details: String,
}

/// Narrows the candidate set for a scheduling request.
pub trait Filter: Send + Sync {
    /// Returns `true` if `candidate` should continue to weighing.
    fn admit(&self, candidate: &Candidate, ctx: &StepContext<'_>) -> Result<bool, StepFailure>;
}

/// Scores surviving candidates. Scores from every weigher in a pipeline are
/// normalized independently to `[0, 1]` across the candidate set, scaled by
/// the weigher's `multiplier`, then summed.
pub trait Weigher: Send + Sync {
    /// Returns this weigher's raw (pre-normalization) score for `candidate`.
    /// Higher is better.
    fn weigh(&self, candidate: &Candidate, ctx: &StepContext<'_>) -> Result<f64, StepFailure>;

    /// The multiplier applied to this weigher's normalized score before
    /// summing with other weighers. Defaults to `1.0`.
    fn multiplier(&self) -> f64 {
        1.0
    }
}

/// Inspects the current knowledge snapshot on a schedule and emits findings.
/// Unlike [`Filter`] and [`Weigher`], a detector does not run as part of
/// admission; it is driven by the controller on its pipeline's own
/// schedule.
pub trait Detector: Send + Sync {
    /// Runs this detector, returning zero or more findings.
    fn detect(&self, ctx: &StepContext<'_>) -> Result<Vec<Finding>, StepFailure>;
}

/// A constructed step, tagged with the kind it was built as.
pub enum BuiltStep {
    /// A constructed [`Filter`].
    Filter(Box<dyn Filter>),
    /// A constructed [`Weigher`].
    Weigher(Box<dyn Weigher>),
    /// A constructed [`Detector`].
    Detector(Box<dyn Detector>),
}

impl BuiltStep {
    fn kind(&self) -> StepKind {
        match self {
            Self::Filter(_) => StepKind::Filter,
            Self::Weigher(_) => StepKind::Weigher,
            Self::Detector(_) => StepKind::Detector,
        }
    }
}

/// A registered step implementation: a stable key, the kind it builds, and
/// a constructor taking the step's declared parameters.
pub trait NamedFactory: Send + Sync {
    /// The implementation key operators reference via `uses`.
    fn name(&self) -> &'static str;

    /// The kind of step this factory builds.
    fn kind(&self) -> StepKind;

    /// Validates `spec.params` and constructs the step.
    fn build(&self, spec: &StepSpec) -> Result<BuiltStep, Error>;
}

type FactoryMap = HashMap<&'static str, Arc<dyn NamedFactory>>;

static FACTORIES: OnceLock<FactoryMap> = OnceLock::new();

/// Returns the process-wide map of built-in step factories, building it on
/// first access.
pub fn builtin_factories() -> &'static FactoryMap {
    FACTORIES.get_or_init(|| {
        let mut map: FactoryMap = HashMap::new();
        for factory in steps::all() {
            let _prev = map.insert(factory.name(), factory);
        }
        map
    })
}

fn resolve_step(spec: &StepSpec, expected_section: &'static str) -> Result<BuiltStep, Error> {
    let factory =
        builtin_factories()
            .get(spec.uses.as_str())
            .cloned()
            .ok_or_else(|| Error::UnknownStep {
                uses: spec.uses.clone(),
            })?;
    let built = factory.build(spec)?;
    let expected_kind = match expected_section {
        "filters" => StepKind::Filter,
        "weighers" => StepKind::Weigher,
        "detectors" => StepKind::Detector,
        _ => unreachable!("internal call sites only pass known section names"),
    };
    if built.kind() != expected_kind {
        return Err(Error::WrongStepKind {
            uses: spec.uses.clone(),
            expected_section,
            actual: built.kind(),
        });
    }
    Ok(built)
}

/// A constructed filter paired with the display name of the step that
/// built it, so the engine and decision recorder can attribute activations
/// back to a step without re-deriving indices into the original spec (steps
/// skipped because `optional` construction failed would otherwise shift
/// that mapping out of alignment).
pub struct NamedFilter {
    /// The step's display name (see [`StepSpec::display_name`]).
    pub name: String,
    /// The constructed filter.
    pub filter: Box<dyn Filter>,
}

/// A constructed weigher paired with its step's display name.
pub struct NamedWeigher {
    /// The step's display name (see [`StepSpec::display_name`]).
    pub name: String,
    /// The constructed weigher.
    pub weigher: Box<dyn Weigher>,
}

/// A constructed detector paired with its step's display name.
pub struct NamedDetector {
    /// The step's display name (see [`StepSpec::display_name`]).
    pub name: String,
    /// The constructed detector.
    pub detector: Box<dyn Detector>,
}

/// A pipeline spec resolved into constructed steps, ready for the engine to
/// run.
pub struct ResolvedPipeline {
    /// The pipeline's declarative spec.
    pub spec: PipelineSpec,
    /// Constructed filters, in declaration order.
    pub filters: Vec<NamedFilter>,
    /// Constructed weighers, in declaration order.
    pub weighers: Vec<NamedWeigher>,
    /// Constructed detectors, in declaration order.
    pub detectors: Vec<NamedDetector>,
}

/// Resolves every step in `spec` against [`builtin_factories`].
///
/// A step marked `optional` whose construction fails is logged and dropped
/// rather than failing the whole pipeline; any other failure aborts
/// resolution.
///
/// # Errors
/// Returns the first non-optional step's construction error.
pub fn resolve_pipeline(spec: PipelineSpec) -> Result<ResolvedPipeline, Error> {
    let mut filters = Vec::with_capacity(spec.filters.len());
    for step in &spec.filters {
        match resolve_step(step, "filters") {
            Ok(BuiltStep::Filter(filter)) => filters.push(NamedFilter {
                name: step.display_name().to_string(),
                filter,
            }),
            Ok(_) => unreachable!("resolve_step enforces the expected kind"),
            Err(e) if step.optional => {
                tracing::warn!(step = step.display_name(), error = %e, "skipping optional filter");
            }
            Err(e) => return Err(e),
        }
    }

    let mut weighers = Vec::with_capacity(spec.weighers.len());
    for step in &spec.weighers {
        match resolve_step(step, "weighers") {
            Ok(BuiltStep::Weigher(weigher)) => weighers.push(NamedWeigher {
                name: step.display_name().to_string(),
                weigher,
            }),
            Ok(_) => unreachable!("resolve_step enforces the expected kind"),
            Err(e) if step.optional => {
                tracing::warn!(step = step.display_name(), error = %e, "skipping optional weigher");
            }
            Err(e) => return Err(e),
        }
    }

    let mut detectors = Vec::with_capacity(spec.detectors.len());
    for step in &spec.detectors {
        match resolve_step(step, "detectors") {
            Ok(BuiltStep::Detector(detector)) => detectors.push(NamedDetector {
                name: step.display_name().to_string(),
                detector,
            }),
            Ok(_) => unreachable!("resolve_step enforces the expected kind"),
            Err(e) if step.optional => {
                tracing::warn!(step = step.display_name(), error = %e, "skipping optional detector");
            }
            Err(e) => return Err(e),
        }
    }

    debug_assert!(matches!(
        spec.kind,
        PipelineKind::FilterWeigher | PipelineKind::Detector
    ));

    Ok(ResolvedPipeline {
        spec,
        filters,
        weighers,
        detectors,
    })
}
