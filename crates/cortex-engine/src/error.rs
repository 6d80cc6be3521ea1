//! Errors for pipeline execution.

use miette::Diagnostic;

/// Errors returned by [`crate::Engine::run`].
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// The request named a pipeline that is not currently loaded.
    #[error("unknown pipeline `{name}`")]
    #[diagnostic(code(cortex_engine::unknown_pipeline))]
    UnknownPipeline {
        /// The unresolved pipeline name.
        name: String,
    },

    /// No candidates survived filtering.
    #[error("no candidate survived filtering in pipeline `{pipeline}`")]
    #[diagnostic(code(cortex_engine::no_candidates_admitted))]
    NoCandidatesAdmitted {
        /// The pipeline that rejected every candidate.
        pipeline: String,
    },

    /// `ignore_preselection` was requested but the engine was not given a
    /// [`crate::CandidateGatherer`] for the request's domain.
    #[error("pipeline `{pipeline}` requested preselection bypass, but no candidate gatherer is registered for its domain")]
    #[diagnostic(code(cortex_engine::no_candidate_gatherer))]
    NoCandidateGatherer {
        /// The pipeline that requested the bypass.
        pipeline: String,
    },

    /// A step failed during `admit`/`weigh`.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Step(#[from] cortex_registry::StepFailure),

    /// The request itself was malformed: an empty candidate set, or a
    /// weight map that doesn't cover exactly the candidate set's host ids.
    #[error("bad scheduling request: {reason}")]
    #[diagnostic(code(cortex_engine::bad_request))]
    BadRequest {
        /// Human-readable detail of what was wrong with the request.
        reason: String,
    },

    /// A step produced output that violates the engine's own invariants
    /// (e.g. a non-finite weigher score), as opposed to a request problem.
    #[error("internal engine error: {details}")]
    #[diagnostic(code(cortex_engine::internal))]
    Internal {
        /// Human-readable detail of the invariant violation.
        details: String,
    },

    /// The run was cancelled before completing.
    #[error("run cancelled")]
    #[diagnostic(code(cortex_engine::cancelled))]
    Cancelled,
}
