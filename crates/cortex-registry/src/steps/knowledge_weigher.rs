//! `knowledge-weigher`: scores a candidate directly from a named knowledge
//! table, optionally inverting the sense so that a lower knowledge value
//! produces a higher score (e.g. preferring hosts with lower CPU usage).

use crate::{Candidate, Error, NamedFactory, StepContext, StepFailure, StepKind, Weigher};
use cortex_config::step::StepSpec;
use cortex_config::validation;

pub struct Factory;

impl NamedFactory for Factory {
    fn name(&self) -> &'static str {
        "knowledge-weigher"
    }

    fn kind(&self) -> StepKind {
        StepKind::Weigher
    }

    fn build(&self, spec: &StepSpec) -> Result<crate::BuiltStep, Error> {
        let knowledge = validation::required(spec, "knowledge", |v| v.as_str().map(str::to_string))?;
        let invert = validation::optional(spec, "invert", false, |v| v.as_bool())?;
        let multiplier = validation::optional(spec, "multiplier", 1.0, |v| v.as_f64())?;
        let default_when_missing = validation::optional(spec, "default-when-missing", 0.0, |v| v.as_f64())?;
        Ok(crate::BuiltStep::Weigher(Box::new(KnowledgeWeigher {
            knowledge,
            invert,
            multiplier,
            default_when_missing,
        })))
    }
}

struct KnowledgeWeigher {
    knowledge: String,
    invert: bool,
    multiplier: f64,
    default_when_missing: f64,
}

impl Weigher for KnowledgeWeigher {
    fn weigh(&self, candidate: &Candidate, ctx: &StepContext<'_>) -> Result<f64, StepFailure> {
        let snapshot = ctx.knowledge.get(&self.knowledge).map_err(|e| StepFailure {
            step: "knowledge-weigher".to_string(),
            details: e.to_string(),
        })?;
        let raw = match snapshot.get(&candidate.host_id) {
            Some(value) => value.as_f64().ok_or_else(|| StepFailure {
                step: "knowledge-weigher".to_string(),
                details: format!(
                    "expected a numeric value for `{}` in `{}`, got {value}",
                    candidate.host_id, self.knowledge
                ),
            })?,
            None => self.default_when_missing,
        };
        Ok(if self.invert { -raw } else { raw })
    }

    fn multiplier(&self) -> f64 {
        self.multiplier
    }
}
