//! Errors for the config crate.

use crate::{KnowledgeName, PipelineName, StepName};
use miette::Diagnostic;

/// Errors that can occur while parsing or validating a declarative document
/// (a [`crate::pipeline::PipelineSpec`] or a [`crate::knowledge::KnowledgeSpec`]).
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// A collection of errors that occurred while validating a single document.
    #[error("invalid configuration: {errors:?}")]
    #[diagnostic(code(cortex_config::invalid_configuration))]
    InvalidConfiguration {
        /// The individual validation failures.
        #[related]
        errors: Vec<Error>,
    },

    /// Failed to read a configuration file from disk.
    #[error("failed to read configuration file: {details}")]
    #[diagnostic(code(cortex_config::file_read_error))]
    FileReadError {
        /// Human-readable details of the I/O failure.
        details: String,
    },

    /// Failed to deserialize a configuration document.
    #[error("{format} deserialization error: {details}")]
    #[diagnostic(code(cortex_config::deserialization_error))]
    DeserializationError {
        /// The format of the document (e.g. `"JSON"` or `"YAML"`).
        format: String,
        /// Human-readable details of the deserialization failure.
        details: String,
    },

    /// A pipeline spec declared an empty name.
    #[error("pipeline name must not be empty")]
    #[diagnostic(code(cortex_config::empty_pipeline_name))]
    EmptyPipelineName,

    /// A knowledge spec declared an empty name.
    #[error("knowledge name must not be empty")]
    #[diagnostic(code(cortex_config::empty_knowledge_name))]
    EmptyKnowledgeName,

    /// A `filter-weigher` pipeline declared no filters and no weighers.
    #[error("pipeline `{name}` declares no filters and no weighers")]
    #[diagnostic(code(cortex_config::empty_pipeline_steps))]
    EmptyPipelineSteps {
        /// The offending pipeline's name.
        name: PipelineName,
    },

    /// A `detector` pipeline declared no detectors.
    #[error("detector pipeline `{name}` declares no detectors")]
    #[diagnostic(code(cortex_config::empty_detector_steps))]
    EmptyDetectorSteps {
        /// The offending pipeline's name.
        name: PipelineName,
    },

    /// Two pipelines in the same settings document declared the same name.
    #[error("duplicate pipeline name `{name}`")]
    #[diagnostic(code(cortex_config::duplicate_pipeline_name))]
    DuplicatePipelineName {
        /// The name shared by more than one pipeline.
        name: PipelineName,
    },

    /// A knowledge spec declares itself as one of its own dependencies.
    #[error("knowledge `{name}` cannot depend on itself")]
    #[diagnostic(code(cortex_config::self_referential_knowledge))]
    SelfReferentialKnowledge {
        /// The offending knowledge's name.
        name: KnowledgeName,
    },

    /// A step's `params` value failed to satisfy the type the step expects.
    #[error("invalid parameter `{param}` for step `{step}`: {details}")]
    #[diagnostic(code(cortex_config::bad_param))]
    BadParam {
        /// The step's implementation key.
        step: StepName,
        /// The parameter name that failed validation.
        param: String,
        /// Human-readable details of the failure.
        details: String,
    },

    /// A required step parameter was missing.
    #[error("missing required parameter `{param}` for step `{step}`")]
    #[diagnostic(code(cortex_config::missing_param))]
    MissingParam {
        /// The step's implementation key.
        step: StepName,
        /// The missing parameter's name.
        param: String,
    },
}
