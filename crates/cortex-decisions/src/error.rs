//! Errors for decision recording.

use miette::Diagnostic;

/// Errors returned by a [`crate::DecisionStore`].
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// The underlying store rejected the write after every retry attempt
    /// was exhausted.
    #[error("failed to record decision after {attempts} attempts: {details}")]
    #[diagnostic(code(cortex_decisions::record_failed))]
    RecordFailed {
        /// How many attempts were made, including the first.
        attempts: u32,
        /// The last attempt's failure details.
        details: String,
    },
}
