//! Status conditions, reported by the controller for each running pipeline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The kind of condition being reported.
///
/// New kinds are appended here as the controller grows new readiness
/// gates; consumers should treat an unrecognized kind as unknown rather
/// than erroring, since [`ConditionKind`] is not `#[non_exhaustive]` only
/// because it lives in a single binary's dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionKind {
    /// Every knowledge table the pipeline's steps depend on has completed
    /// at least one index/construction pass.
    AllStepsIndexed,
    /// Every step in the pipeline reports itself ready to run (dependent
    /// knowledge tables are published and not stale).
    AllStepsReady,
    /// The pipeline as a whole is ready to serve requests.
    Ready,
}

/// Whether a condition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    /// The condition holds.
    True,
    /// The condition does not hold.
    False,
    /// The condition's truth value could not be determined.
    Unknown,
}

/// A machine-readable reason code for a condition's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionReason {
    /// All dependencies are satisfied; this is the steady-state reason for
    /// a `True` condition.
    Satisfied,
    /// The pipeline was just registered and has not yet been reconciled.
    PendingReconciliation,
    /// At least one dependent knowledge table has never published a
    /// snapshot.
    KnowledgeNeverPublished,
    /// At least one step failed to construct against its current
    /// parameters.
    StepConstructionFailed,
    /// The controller's reconciliation loop hit an internal error while
    /// evaluating this pipeline.
    ReconciliationError,
}

/// A single status condition, modeled after the condition pattern common to
/// declarative reconcilers: a stable `kind`, a tri-state `status`, and a
/// `reason`/`message` pair explaining the current status.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    /// The kind of condition.
    pub kind: ConditionKind,
    /// Whether the condition currently holds.
    pub status: ConditionStatus,
    /// A machine-readable reason for the current status.
    pub reason: ConditionReason,
    /// A human-readable elaboration of `reason`, e.g. naming the knowledge
    /// table that never published.
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    /// Builds a condition in the `True`/`Satisfied` steady state.
    #[must_use]
    pub const fn satisfied(kind: ConditionKind) -> Self {
        Self {
            kind,
            status: ConditionStatus::True,
            reason: ConditionReason::Satisfied,
            message: None,
        }
    }

    /// Builds a condition in a `False` state with the given reason and
    /// message.
    #[must_use]
    pub fn unsatisfied(
        kind: ConditionKind,
        reason: ConditionReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            status: ConditionStatus::False,
            reason,
            message: Some(message.into()),
        }
    }

    /// Returns `true` if this condition's status is [`ConditionStatus::True`].
    #[must_use]
    pub const fn is_true(&self) -> bool {
        matches!(self.status, ConditionStatus::True)
    }
}
