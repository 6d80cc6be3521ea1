//! Errors for knowledge refresh.

use miette::Diagnostic;

/// Errors returned by a [`crate::Producer`].
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// The producer failed to build a snapshot.
    #[error("producer for `{knowledge}` failed: {details}")]
    #[diagnostic(code(cortex_refresher::produce_failed))]
    ProduceFailed {
        /// The knowledge table the producer was building a snapshot for.
        knowledge: String,
        /// Human-readable details of the failure.
        details: String,
    },
}
