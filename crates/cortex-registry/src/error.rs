//! Errors for step construction.

use cortex_config::{Error as ConfigError, StepName};
use miette::Diagnostic;

/// Errors returned while resolving a [`cortex_config::step::StepSpec`]
/// against the registry.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// A step's `uses` key did not match any registered implementation.
    #[error("unknown step implementation `{uses}`")]
    #[diagnostic(code(cortex_registry::unknown_step))]
    UnknownStep {
        /// The unresolved `uses` key.
        uses: StepName,
    },

    /// A step's `uses` key resolved to an implementation of the wrong kind
    /// for where it was declared (e.g. a weigher listed under `filters`).
    #[error("step `{uses}` is a {actual:?}, but was declared under `{expected_section}`")]
    #[diagnostic(code(cortex_registry::wrong_step_kind))]
    WrongStepKind {
        /// The step's `uses` key.
        uses: StepName,
        /// The section of the pipeline spec it was declared under.
        expected_section: &'static str,
        /// The kind the implementation actually registers as.
        actual: crate::StepKind,
    },

    /// A step's `params` failed validation against its declared schema.
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidParams(#[from] ConfigError),
}
