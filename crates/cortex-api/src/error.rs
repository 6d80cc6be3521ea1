//! Errors for the HTTP admission boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur in the scheduler/admin HTTP server.
///
/// Variants map to the status codes in §6 of the scheduling contract:
/// `BadRequest`/`UnknownDomain` to `400`, `UnknownPipeline`/`PipelineNotReady`
/// to `503`, and `FilterEmptiedSet`/`Internal` to `500`. Variants used only
/// at server bootstrap (`BindFailed`, `ServerError`) never reach
/// [`IntoResponse`] in practice but fall back to `500` for completeness.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to bind the TCP listener on the given address.
    #[error("failed to bind admin HTTP server on `{addr}`: {details}")]
    BindFailed {
        /// The address we attempted to bind to.
        addr: String,
        /// Human-readable details of the bind failure.
        details: String,
    },

    /// The HTTP server encountered a fatal error while serving.
    #[error("admin HTTP server error on `{addr}`: {details}")]
    ServerError {
        /// The address the server was bound to.
        addr: String,
        /// Human-readable details of the server failure.
        details: String,
    },

    /// The request body did not decode as the expected JSON shape.
    #[error("failed to decode request body: {details}")]
    DecodeFailed {
        /// Human-readable details of the decode failure.
        details: String,
    },

    /// The path did not name a recognized scheduling domain.
    #[error("unknown scheduling domain `{segment}`")]
    UnknownDomain {
        /// The unrecognized path segment.
        segment: String,
    },

    /// The request's weight map and candidate set disagreed, or the
    /// candidate set was empty.
    #[error("bad scheduling request: {reason}")]
    BadRequest {
        /// Human-readable detail of what was wrong with the request.
        reason: String,
    },

    /// The named pipeline is not loaded.
    #[error("unknown pipeline `{name}`")]
    UnknownPipeline {
        /// The unresolved pipeline name.
        name: String,
    },

    /// The named pipeline is loaded but not yet ready to serve requests.
    #[error("pipeline `{name}` is not ready")]
    PipelineNotReady {
        /// The pipeline that is not ready.
        name: String,
    },

    /// A filter removed every candidate, emptying the set.
    #[error("filter emptied the candidate set for pipeline `{pipeline}`")]
    FilterEmptiedSet {
        /// The pipeline whose filters emptied the set.
        pipeline: String,
    },

    /// The run did not complete before its deadline and was cancelled.
    #[error("request cancelled before the pipeline run completed")]
    Cancelled,

    /// An unexpected internal failure, e.g. a non-finite weigher score or a
    /// decision record that could not be persisted after every retry.
    #[error("internal error: {details}")]
    Internal {
        /// Human-readable detail of the internal failure.
        details: String,
    },
}

impl From<cortex_engine::Error> for Error {
    fn from(e: cortex_engine::Error) -> Self {
        match e {
            cortex_engine::Error::UnknownPipeline { name } => Self::UnknownPipeline { name },
            cortex_engine::Error::NoCandidatesAdmitted { pipeline } => Self::FilterEmptiedSet { pipeline },
            cortex_engine::Error::NoCandidateGatherer { pipeline } => Self::Internal {
                details: format!("pipeline `{pipeline}` bypasses preselection but has no candidate gatherer registered"),
            },
            cortex_engine::Error::BadRequest { reason } => Self::BadRequest { reason },
            cortex_engine::Error::Internal { details } => Self::Internal { details },
            cortex_engine::Error::Cancelled => Self::Cancelled,
            cortex_engine::Error::Step(e) => Self::Internal { details: e.to_string() },
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::DecodeFailed { .. } | Self::UnknownDomain { .. } | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::UnknownPipeline { .. } | Self::PipelineNotReady { .. } | Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::FilterEmptiedSet { .. } | Self::Internal { .. } | Self::BindFailed { .. } | Self::ServerError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(ErrorBody { error: self.to_string() });
        (status, body).into_response()
    }
}
