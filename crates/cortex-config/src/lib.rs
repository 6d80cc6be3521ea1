//! Declarative configuration model for Cortex.
//!
//! Data model:
//! - a data plane declares scheduling domains
//!   - each domain has knowledge tables and pipelines
//!     - a pipeline is an ordered composition of filter/weigher/detector steps
//!
//! This crate only models the declarative documents (what an operator writes
//! down or what a management API accepts); it does not build runtime
//! pipelines or hold knowledge data. See `cortex-registry` for step
//! construction, `cortex-knowledge` for the runtime store, and
//! `cortex-controller` for reconciling specs into running pipelines.

use serde::{Deserialize, Serialize};

pub mod condition;
pub mod domain;
pub mod error;
pub mod knowledge;
pub mod pipeline;
pub mod settings;
pub mod step;
pub mod validation;

/// The name of a pipeline, unique within the process.
pub type PipelineName = String;

/// The name of a knowledge table, unique within the process.
pub type KnowledgeName = String;

/// The implementation key of a step (e.g. `"knowledge-threshold-filter"`),
/// resolved against the step registry.
pub type StepName = String;

/// A free-text description attached to a pipeline or step declaration.
pub type Description = String;

/// A stable host identifier as supplied by the upstream control plane.
pub type HostId = String;

pub use domain::SchedulingDomain;

/// Monotonically increasing version number for a published knowledge
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    /// The version before any snapshot has ever been published.
    #[must_use]
    pub const fn initial() -> Self {
        Self(0)
    }

    /// Returns the next version in sequence.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
