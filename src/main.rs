//! `cortexd`: the Cortex scheduling service process.
//!
//! Wires together the crates in this workspace into a running service:
//! loads a [`cortex_config::settings::Settings`] document, builds the
//! knowledge store and engine, reconciles every declared pipeline through
//! the controller, spawns one refresh loop per knowledge table, and serves
//! the scheduler/admin HTTP API until told to shut down.
//!
//! Concrete datasource adapters (Prometheus queries, OpenStack REST
//! clients, database drivers) are out of scope for this crate (spec.md
//! §1); every knowledge table here is fed by a [`cortex_refresher::StaticProducer`]
//! seeded with no rows, which is enough to exercise the full reconcile →
//! ready → serve path without a live upstream. A real deployment supplies
//! its own [`cortex_refresher::Producer`] implementations and registers
//! them in place of the static ones below.

use clap::Parser;
use cortex_config::settings::Settings;
use cortex_controller::Controller;
use cortex_decisions::InMemoryDecisionStore;
use cortex_engine::Engine;
use cortex_refresher::{Refresher, StaticProducer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Cortex: an out-of-band placement and scheduling service.
#[derive(Parser, Debug)]
#[command(name = "cortexd", version, about)]
struct Cli {
    /// Path to the settings document (YAML or JSON).
    #[arg(long, short = 'c', default_value = "cortex.yaml")]
    config: PathBuf,

    /// Overrides the settings document's `admin-addr`.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Validates the settings document and exits without starting the
    /// server.
    #[arg(long)]
    check: bool,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .json()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut settings = Settings::from_file(&cli.config)?;
    settings.validate()?;
    if let Some(bind) = cli.bind {
        settings.admin_addr = bind;
    }

    if cli.check {
        tracing::info!(path = %cli.config.display(), "settings document is valid");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                cancel.cancel();
            }
        });
    }

    let knowledge = Arc::new(cortex_knowledge::KnowledgeStore::new(
        settings.knowledge.iter().map(|spec| spec.name.clone()),
    ));

    let engine = Arc::new(Engine::new(knowledge.clone()));
    let controller = Controller::new(engine, knowledge.clone());
    for spec in &settings.pipelines {
        let name = spec.name.clone();
        if let Err(e) = controller.upsert(spec.clone(), &cancel) {
            tracing::error!(pipeline = name, error = %e, "failed to load pipeline from settings");
        }
    }

    let mut refresher = Refresher::new(knowledge);
    for spec in &settings.knowledge {
        refresher.register(spec.clone(), Arc::new(StaticProducer::default()));
    }
    let refresher = Arc::new(refresher);
    let refresh_handles = refresher.spawn(cancel.clone());

    let decisions: Arc<dyn cortex_decisions::DecisionStore> =
        Arc::new(InMemoryDecisionStore::new(settings.decision_history_capacity));

    let result = cortex_api::run(
        settings.admin_addr,
        controller,
        decisions,
        settings.decision_retry,
        settings.request_timeout,
        cancel.clone(),
    )
    .await;

    cancel.cancel();
    for handle in refresh_handles {
        let _ = handle.await;
    }

    result.map_err(anyhow::Error::from)
}
