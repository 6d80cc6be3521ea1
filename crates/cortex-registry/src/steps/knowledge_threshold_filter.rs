//! `knowledge-threshold-filter`: admits a candidate only if a named
//! knowledge table reports a value at or below a threshold.

use crate::{Candidate, Error, Filter, NamedFactory, StepContext, StepFailure, StepKind};
use cortex_config::step::StepSpec;
use cortex_config::validation;

pub struct Factory;

impl NamedFactory for Factory {
    fn name(&self) -> &'static str {
        "knowledge-threshold-filter"
    }

    fn kind(&self) -> StepKind {
        StepKind::Filter
    }

    fn build(&self, spec: &StepSpec) -> Result<crate::BuiltStep, Error> {
        let knowledge = validation::required(spec, "knowledge", |v| v.as_str().map(str::to_string))?;
        let threshold = validation::required(spec, "threshold", |v| v.as_f64())?;
        let admit_when_missing = validation::optional(spec, "admit-when-missing", true, |v| v.as_bool())?;
        Ok(crate::BuiltStep::Filter(Box::new(ThresholdFilter {
            knowledge,
            threshold,
            admit_when_missing,
        })))
    }
}

struct ThresholdFilter {
    knowledge: String,
    threshold: f64,
    admit_when_missing: bool,
}

impl Filter for ThresholdFilter {
    fn admit(&self, candidate: &Candidate, ctx: &StepContext<'_>) -> Result<bool, StepFailure> {
        let snapshot = ctx.knowledge.get(&self.knowledge).map_err(|e| StepFailure {
            step: "knowledge-threshold-filter".to_string(),
            details: e.to_string(),
        })?;
        let Some(value) = snapshot.get(&candidate.host_id) else {
            return Ok(self.admit_when_missing);
        };
        let Some(value) = value.as_f64() else {
            return Err(StepFailure {
                step: "knowledge-threshold-filter".to_string(),
                details: format!(
                    "expected a numeric value for `{}` in `{}`, got {value}",
                    candidate.host_id, self.knowledge
                ),
            });
        };
        Ok(value <= self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_knowledge::KnowledgeStore;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn spec(params: BTreeMap<String, cortex_config::step::ParamValue>) -> StepSpec {
        StepSpec {
            uses: "knowledge-threshold-filter".to_string(),
            name: None,
            params,
            optional: false,
        }
    }

    #[test]
    fn admits_candidate_at_or_below_threshold() {
        let mut params = BTreeMap::new();
        params.insert(
            "knowledge".to_string(),
            cortex_config::step::ParamValue::String("host-cpu-usage".to_string()),
        );
        params.insert("threshold".to_string(), cortex_config::step::ParamValue::Float(0.8));
        let factory = Factory;
        let built = factory.build(&spec(params)).unwrap();
        let crate::BuiltStep::Filter(filter) = built else {
            panic!("expected a filter");
        };

        let store = KnowledgeStore::new(["host-cpu-usage".to_string()]);
        let mut data = std::collections::HashMap::new();
        data.insert("host-1".to_string(), json!(0.5));
        data.insert("host-2".to_string(), json!(0.95));
        store.publish("host-cpu-usage", data).unwrap();

        let ctx = StepContext { knowledge: &store };
        let c1 = Candidate {
            host_id: "host-1".to_string(),
            attributes: json!({}),
        };
        let c2 = Candidate {
            host_id: "host-2".to_string(),
            attributes: json!({}),
        };
        assert!(filter.admit(&c1, &ctx).unwrap());
        assert!(!filter.admit(&c2, &ctx).unwrap());
    }

    #[test]
    fn missing_host_defaults_to_admitted() {
        let mut params = BTreeMap::new();
        params.insert(
            "knowledge".to_string(),
            cortex_config::step::ParamValue::String("host-cpu-usage".to_string()),
        );
        params.insert("threshold".to_string(), cortex_config::step::ParamValue::Float(0.8));
        let factory = Factory;
        let built = factory.build(&spec(params)).unwrap();
        let crate::BuiltStep::Filter(filter) = built else {
            panic!("expected a filter");
        };

        let store = KnowledgeStore::new(["host-cpu-usage".to_string()]);
        store.publish("host-cpu-usage", std::collections::HashMap::new()).unwrap();
        let ctx = StepContext { knowledge: &store };
        let candidate = Candidate {
            host_id: "unknown-host".to_string(),
            attributes: json!({}),
        };
        assert!(filter.admit(&candidate, &ctx).unwrap());
    }
}
