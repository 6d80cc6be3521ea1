//! `static-weight-weigher`: assigns every candidate an equal raw score,
//! scaled by a configured multiplier. Useful as a deterministic tie-break
//! contribution or while a more specific weigher is rolled out gradually.

use crate::{Candidate, Error, NamedFactory, StepContext, StepFailure, StepKind, Weigher};
use cortex_config::step::StepSpec;
use cortex_config::validation;

pub struct Factory;

impl NamedFactory for Factory {
    fn name(&self) -> &'static str {
        "static-weight-weigher"
    }

    fn kind(&self) -> StepKind {
        StepKind::Weigher
    }

    fn build(&self, spec: &StepSpec) -> Result<crate::BuiltStep, Error> {
        let weight = validation::optional(spec, "weight", 1.0, |v| v.as_f64())?;
        Ok(crate::BuiltStep::Weigher(Box::new(StaticWeightWeigher { weight })))
    }
}

struct StaticWeightWeigher {
    weight: f64,
}

impl Weigher for StaticWeightWeigher {
    fn weigh(&self, _candidate: &Candidate, _ctx: &StepContext<'_>) -> Result<f64, StepFailure> {
        Ok(1.0)
    }

    fn multiplier(&self) -> f64 {
        self.weight
    }
}
