//! HTTP admission boundary: the external scheduler request handler plus the
//! shared admin endpoints (status, health probes, metrics).

pub mod error;
mod health;
mod metrics;
mod scheduler;

use axum::Router;
use cortex_config::settings::RetryPolicy;
use cortex_controller::Controller;
use cortex_decisions::DecisionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::Error;

/// Shared state for every HTTP handler in this crate.
#[derive(Clone)]
struct AppState {
    /// Resolves pipeline names to readiness and declarative specs, and
    /// holds the engine runs are dispatched to.
    controller: Arc<Controller>,
    /// Where completed (and failed) decisions are persisted.
    decisions: Arc<dyn DecisionStore>,
    /// Retry policy applied to decision persistence.
    decision_retry: RetryPolicy,
    /// Per-request deadline; a run exceeding this is cancelled and answered
    /// with a `503`.
    request_timeout: Duration,
}

/// Builds the admin/scheduler `Router`, without binding or serving it.
///
/// Split out from [`run`] so integration tests can drive the full HTTP
/// stack (request decoding, admission, dispatch, decision recording)
/// through [`tower::ServiceExt::oneshot`] without opening a real socket.
#[must_use]
pub fn app(
    controller: Arc<Controller>,
    decisions: Arc<dyn DecisionStore>,
    decision_retry: RetryPolicy,
    request_timeout: Duration,
) -> Router {
    let state = AppState {
        controller,
        decisions,
        decision_retry,
        request_timeout,
    };

    Router::new()
        .merge(health::routes())
        .merge(metrics::routes())
        .merge(scheduler::routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(TimeoutLayer::new(request_timeout)))
        .with_state(state)
}

/// Runs the admin/scheduler HTTP server until `cancel` fires.
///
/// # Errors
/// Returns [`Error::BindFailed`] if the listener cannot bind, or
/// [`Error::ServerError`] if the server exits with an I/O error.
pub async fn run(
    bind_addr: SocketAddr,
    controller: Arc<Controller>,
    decisions: Arc<dyn DecisionStore>,
    decision_retry: RetryPolicy,
    request_timeout: Duration,
    cancel: CancellationToken,
) -> Result<(), Error> {
    let app = app(controller, decisions, decision_retry, request_timeout);

    let listener = TcpListener::bind(bind_addr).await.map_err(|e| Error::BindFailed {
        addr: bind_addr.to_string(),
        details: e.to_string(),
    })?;

    tracing::info!(addr = %bind_addr, "scheduler API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
        .map_err(|e| Error::ServerError {
            addr: bind_addr.to_string(),
            details: e.to_string(),
        })
}
