//! Errors for the knowledge store.

use cortex_config::KnowledgeName;
use miette::Diagnostic;

/// Errors returned by [`crate::KnowledgeStore`] operations.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// A lookup or subscription named a table that was never registered.
    #[error("unknown knowledge table `{name}`")]
    #[diagnostic(code(cortex_knowledge::unknown_table))]
    UnknownTable {
        /// The table name that was not found.
        name: KnowledgeName,
    },
}
