//! Periodic refresh of knowledge tables.
//!
//! Each registered table gets its own refresh loop, ticking at the
//! interval declared in its [`cortex_config::knowledge::KnowledgeSpec`].
//! A table's loop skips a tick (rather than producing against stale
//! inputs) when any of its declared dependencies has never published a
//! snapshot; this is the full extent of the dependency awareness this
//! crate provides; it does not attempt to order refreshes into a strict
//! topological schedule.

pub mod error;
pub mod producer;

pub use error::Error;
pub use producer::StaticProducer;

use async_trait::async_trait;
use cortex_config::knowledge::KnowledgeSpec;
use cortex_knowledge::KnowledgeStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Builds a snapshot for one knowledge table.
///
/// Implementations typically call out to an upstream control plane (Nova's
/// placement API, a metrics backend, and so on); this crate only owns
/// scheduling the call and publishing the result.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Produces a fresh snapshot, keyed by host id.
    async fn produce(&self) -> Result<HashMap<String, serde_json::Value>, Error>;
}

struct Registration {
    spec: KnowledgeSpec,
    producer: Arc<dyn Producer>,
}

/// Owns the refresh loop for every registered knowledge table.
pub struct Refresher {
    knowledge: Arc<KnowledgeStore>,
    registrations: HashMap<String, Registration>,
}

impl Refresher {
    /// Builds a refresher over the given knowledge store. Tables are added
    /// with [`Refresher::register`] before [`Refresher::spawn`] is called.
    #[must_use]
    pub fn new(knowledge: Arc<KnowledgeStore>) -> Self {
        Self {
            knowledge,
            registrations: HashMap::new(),
        }
    }

    /// Registers a table's spec and the producer that builds its
    /// snapshots.
    pub fn register(&mut self, spec: KnowledgeSpec, producer: Arc<dyn Producer>) {
        let _prev = self.registrations.insert(spec.name.clone(), Registration { spec, producer });
    }

    /// Spawns one refresh task per registered table, returning their join
    /// handles. Tasks exit once `cancel` fires.
    #[must_use]
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        self.registrations
            .keys()
            .map(|name| {
                let refresher = Arc::clone(self);
                let name = name.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { refresher.run_loop(&name, cancel).await })
            })
            .collect()
    }

    async fn run_loop(&self, name: &str, cancel: CancellationToken) {
        let Some(registration) = self.registrations.get(name) else {
            return;
        };

        loop {
            tokio::select! {
                () = tokio::time::sleep(registration.spec.refresh_interval) => {}
                () = cancel.cancelled() => return,
            }

            if let Some(unready) = self.first_unready_dependency(&registration.spec) {
                tracing::debug!(knowledge = name, dependency = unready, "skipping refresh, dependency not ready");
                continue;
            }

            match registration.producer.produce().await {
                Ok(data) => {
                    if let Err(e) = self.knowledge.publish(name, data) {
                        tracing::error!(knowledge = name, error = %e, "failed to publish refreshed snapshot");
                    }
                }
                Err(e) => {
                    tracing::warn!(knowledge = name, error = %e, "refresh failed");
                    if !registration.spec.tolerate_refresh_failure {
                        if let Err(e) = self.knowledge.mark_not_ready(name) {
                            tracing::error!(knowledge = name, error = %e, "failed to mark knowledge not ready");
                        }
                    }
                }
            }
        }
    }

    fn first_unready_dependency(&self, spec: &KnowledgeSpec) -> Option<String> {
        spec.dependencies
            .iter()
            .find(|dep| !self.knowledge.is_ready(dep).unwrap_or(false))
            .cloned()
    }
}
