//! Errors for the controller crate.

use miette::Diagnostic;

/// Errors that can occur while reconciling a pipeline spec.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// The spec failed structural validation.
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidSpec(#[from] cortex_config::error::Error),

    /// One or more of the spec's steps failed to resolve against the step
    /// registry.
    #[error(transparent)]
    #[diagnostic(transparent)]
    StepResolution(#[from] cortex_registry::Error),
}
