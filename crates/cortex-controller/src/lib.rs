//! Reconciles declarative [`PipelineSpec`]s into running [`cortex_engine`]
//! pipelines and reports their status as a set of [`Condition`]s.
//!
//! The controller does not own a config-watching loop itself (that is the
//! bootstrap binary's job, driven by whatever settings source it reads);
//! it exposes [`Controller::upsert`] and [`Controller::remove`] for the
//! caller to invoke as specs change, and spawns one lightweight background
//! task per resolved pipeline to keep its readiness conditions current as
//! the knowledge tables it depends on publish new snapshots. For
//! [`PipelineKind::Detector`] pipelines it also spawns a periodic task that
//! runs the pipeline's detectors on its declared `detect-interval` and logs
//! whatever findings they emit.

pub mod error;

pub use error::Error;

use cortex_config::condition::{Condition, ConditionKind, ConditionReason};
use cortex_config::pipeline::{PipelineKind, PipelineSpec};
use cortex_config::step::StepSpec;
use cortex_engine::Engine;
use cortex_knowledge::KnowledgeStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Reconciles pipeline specs into the engine and tracks their status.
pub struct Controller {
    engine: Arc<Engine>,
    knowledge: Arc<KnowledgeStore>,
    statuses: RwLock<HashMap<String, Vec<Condition>>>,
    specs: RwLock<HashMap<String, PipelineSpec>>,
}

impl Controller {
    /// Builds a controller over the given engine and knowledge store.
    #[must_use]
    pub fn new(engine: Arc<Engine>, knowledge: Arc<KnowledgeStore>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            knowledge,
            statuses: RwLock::new(HashMap::new()),
            specs: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the declarative spec currently loaded for `name`, if any.
    ///
    /// Used by the scheduler API to distinguish "no such pipeline" (a
    /// client error) from "pipeline loaded but not ready" (a transient
    /// `503`), and to read domain/`create-decisions` without re-deriving
    /// them from engine state.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<PipelineSpec> {
        self.specs.read().get(name).cloned()
    }

    /// Returns `true` if `name`'s `Ready` condition is currently satisfied.
    /// `false` for both "unready" and "unknown" pipelines; use [`Controller::spec`]
    /// to distinguish the two.
    #[must_use]
    pub fn is_ready(&self, name: &str) -> bool {
        self.status(name)
            .and_then(|conditions| conditions.into_iter().find(|c| c.kind == ConditionKind::Ready))
            .is_some_and(|c| c.is_true())
    }

    /// Returns the engine this controller loads resolved pipelines into, for
    /// callers (the scheduler API) that need to dispatch a run directly.
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Returns the current conditions for every pipeline the controller has
    /// ever reconciled.
    #[must_use]
    pub fn statuses(&self) -> HashMap<String, Vec<Condition>> {
        self.statuses.read().clone()
    }

    /// Returns the current conditions for a single pipeline, if known.
    #[must_use]
    pub fn status(&self, name: &str) -> Option<Vec<Condition>> {
        self.statuses.read().get(name).cloned()
    }

    /// Validates, resolves, and loads `spec` into the engine, then spawns a
    /// background task that keeps its readiness conditions current as its
    /// dependent knowledge tables change.
    ///
    /// Re-running `upsert` for an already-loaded pipeline name replaces the
    /// running pipeline and its status; the previous readiness-watch task
    /// is cancelled in favor of a new one.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSpec`] if the spec fails structural
    /// validation, or [`Error::StepResolution`] if a non-optional step
    /// fails to resolve.
    pub fn upsert(self: &Arc<Self>, spec: PipelineSpec, cancel: &CancellationToken) -> Result<(), Error> {
        spec.validate()?;
        let name = spec.name.clone();
        let kind = spec.kind;
        let detect_interval = spec.detect_interval;
        let dependent_knowledge = dependent_knowledge_names(&spec);
        let _prev = self.specs.write().insert(name.clone(), spec.clone());

        self.set_conditions(&name, vec![Condition::satisfied(ConditionKind::AllStepsIndexed)]);

        let resolved = match cortex_registry::resolve_pipeline(spec) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.set_conditions(
                    &name,
                    vec![Condition::unsatisfied(
                        ConditionKind::AllStepsIndexed,
                        ConditionReason::StepConstructionFailed,
                        e.to_string(),
                    )],
                );
                return Err(e.into());
            }
        };

        self.engine.load_pipeline(resolved);
        self.recompute_readiness(&name, &dependent_knowledge);

        let watcher_cancel = cancel.child_token();
        let controller = Arc::clone(self);
        let watched_name = name.clone();
        tokio::spawn(async move {
            controller
                .watch_readiness(watched_name, dependent_knowledge, watcher_cancel)
                .await;
        });

        if kind == PipelineKind::Detector {
            let detect_cancel = cancel.child_token();
            let controller = Arc::clone(self);
            let detected_name = name.clone();
            tokio::spawn(async move {
                controller.run_detect_loop(detected_name, detect_interval, detect_cancel).await;
            });
        }

        Ok(())
    }

    /// Removes a pipeline from the engine and drops its tracked status.
    pub fn remove(&self, name: &str) {
        self.engine.remove_pipeline(name);
        let _removed = self.statuses.write().remove(name);
        let _removed = self.specs.write().remove(name);
    }

    fn set_conditions(&self, name: &str, conditions: Vec<Condition>) {
        let mut statuses = self.statuses.write();
        let entry = statuses.entry(name.to_string()).or_default();
        for condition in conditions {
            if let Some(existing) = entry.iter_mut().find(|c| c.kind == condition.kind) {
                *existing = condition;
            } else {
                entry.push(condition);
            }
        }
    }

    fn recompute_readiness(&self, name: &str, dependent_knowledge: &[String]) {
        let all_ready = dependent_knowledge
            .iter()
            .all(|k| self.knowledge.is_ready(k).unwrap_or(false));

        let all_steps_ready = if all_ready {
            Condition::satisfied(ConditionKind::AllStepsReady)
        } else {
            let missing = dependent_knowledge
                .iter()
                .find(|k| !self.knowledge.is_ready(k).unwrap_or(false))
                .cloned()
                .unwrap_or_default();
            Condition::unsatisfied(
                ConditionKind::AllStepsReady,
                ConditionReason::KnowledgeNeverPublished,
                format!("`{missing}` has not published a snapshot yet"),
            )
        };

        let indexed = self
            .statuses
            .read()
            .get(name)
            .and_then(|conditions| conditions.iter().find(|c| c.kind == ConditionKind::AllStepsIndexed).cloned())
            .map(|c| c.is_true())
            .unwrap_or(false);

        let ready = if indexed && all_steps_ready.is_true() {
            Condition::satisfied(ConditionKind::Ready)
        } else {
            Condition::unsatisfied(
                ConditionKind::Ready,
                ConditionReason::PendingReconciliation,
                "waiting on step indexing or knowledge readiness",
            )
        };

        self.set_conditions(name, vec![all_steps_ready, ready]);
    }

    /// Spawns one watcher per dependent knowledge table, each recomputing
    /// this pipeline's readiness whenever its table publishes. Running one
    /// task per dependency (rather than multiplexing them into a single
    /// select loop) keeps this independent of any particular fan-in arity.
    async fn watch_readiness(self: Arc<Self>, name: String, dependent_knowledge: Vec<String>, cancel: CancellationToken) {
        if dependent_knowledge.is_empty() {
            return;
        }

        let tasks: Vec<_> = dependent_knowledge
            .iter()
            .filter_map(|knowledge_name| match self.knowledge.subscribe(knowledge_name) {
                Ok(rx) => Some(rx),
                Err(e) => {
                    tracing::warn!(pipeline = name, knowledge = knowledge_name, error = %e, "cannot watch unknown knowledge table");
                    None
                }
            })
            .map(|mut rx| {
                let controller = Arc::clone(&self);
                let name = name.clone();
                let dependent_knowledge = dependent_knowledge.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            () = cancel.cancelled() => return,
                            changed = rx.changed() => {
                                if changed.is_err() {
                                    return;
                                }
                                controller.recompute_readiness(&name, &dependent_knowledge);
                            }
                        }
                    }
                })
            })
            .collect();

        for task in tasks {
            let _ = task.await;
        }
    }

    /// Runs `name`'s detectors on `interval` until `cancel` fires.
    ///
    /// A detector run that errors is logged and the loop continues on its
    /// next tick; it never quiesces future runs. This mirrors the
    /// refresher's own treatment of a producer error (log, keep the
    /// previous state, try again next tick) rather than escalating a single
    /// bad run into a standing failure.
    async fn run_detect_loop(self: Arc<Self>, name: String, interval: std::time::Duration, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                () = cancel.cancelled() => return,
            }

            if !self.engine.has_pipeline(&name) {
                return;
            }

            match self.engine.run_detectors(&name) {
                Ok(findings) => {
                    for finding in &findings {
                        tracing::info!(pipeline = name, subject = finding.subject, code = finding.code, message = finding.message, "detector finding");
                    }
                }
                Err(e) => {
                    tracing::warn!(pipeline = name, error = %e, "detector run failed, will retry next interval");
                }
            }
        }
    }
}

fn dependent_knowledge_names(spec: &PipelineSpec) -> Vec<String> {
    let mut names: Vec<String> = spec
        .filters
        .iter()
        .chain(spec.weighers.iter())
        .chain(spec.detectors.iter())
        .filter_map(knowledge_param)
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

fn knowledge_param(step: &StepSpec) -> Option<String> {
    step.params.get("knowledge").and_then(|v| v.as_str()).map(str::to_string)
}
