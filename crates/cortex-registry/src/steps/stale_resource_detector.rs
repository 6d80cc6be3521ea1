//! `stale-resource-detector`: scans a knowledge table for hosts whose
//! reported age exceeds a threshold and emits a finding per host.

use crate::{Detector, Error, Finding, NamedFactory, StepContext, StepFailure, StepKind};
use cortex_config::step::StepSpec;
use cortex_config::validation;

pub struct Factory;

impl NamedFactory for Factory {
    fn name(&self) -> &'static str {
        "stale-resource-detector"
    }

    fn kind(&self) -> StepKind {
        StepKind::Detector
    }

    fn build(&self, spec: &StepSpec) -> Result<crate::BuiltStep, Error> {
        let knowledge = validation::required(spec, "knowledge", |v| v.as_str().map(str::to_string))?;
        let field = validation::optional(spec, "field", "age-seconds".to_string(), |v| {
            v.as_str().map(str::to_string)
        })?;
        let max_age_seconds = validation::required(spec, "max-age-seconds", |v| v.as_f64())?;
        Ok(crate::BuiltStep::Detector(Box::new(StaleResourceDetector {
            knowledge,
            field,
            max_age_seconds,
        })))
    }
}

struct StaleResourceDetector {
    knowledge: String,
    field: String,
    max_age_seconds: f64,
}

impl Detector for StaleResourceDetector {
    fn detect(&self, ctx: &StepContext<'_>) -> Result<Vec<Finding>, StepFailure> {
        let snapshot = ctx.knowledge.get(&self.knowledge).map_err(|e| StepFailure {
            step: "stale-resource-detector".to_string(),
            details: e.to_string(),
        })?;

        let mut findings = Vec::new();
        for (host_id, value) in snapshot.data.iter() {
            let Some(age) = value.get(&self.field).and_then(serde_json::Value::as_f64) else {
                continue;
            };
            if age > self.max_age_seconds {
                findings.push(Finding {
                    subject: host_id.clone(),
                    code: "stale-resource".to_string(),
                    message: format!(
                        "`{host_id}` reports `{}` = {age}s, exceeding the {}s threshold",
                        self.field, self.max_age_seconds
                    ),
                });
            }
        }
        findings.sort_by(|a, b| a.subject.cmp(&b.subject));
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_knowledge::KnowledgeStore;
    use serde_json::json;

    #[test]
    fn flags_hosts_past_the_age_threshold() {
        let factory = Factory;
        let mut params = std::collections::BTreeMap::new();
        params.insert(
            "knowledge".to_string(),
            cortex_config::step::ParamValue::String("host-last-seen".to_string()),
        );
        params.insert(
            "max-age-seconds".to_string(),
            cortex_config::step::ParamValue::Float(60.0),
        );
        let spec = StepSpec {
            uses: "stale-resource-detector".to_string(),
            name: None,
            params,
            optional: false,
        };
        let built = factory.build(&spec).unwrap();
        let crate::BuiltStep::Detector(detector) = built else {
            panic!("expected a detector");
        };

        let store = KnowledgeStore::new(["host-last-seen".to_string()]);
        let mut data = std::collections::HashMap::new();
        data.insert("host-1".to_string(), json!({"age-seconds": 10.0}));
        data.insert("host-2".to_string(), json!({"age-seconds": 120.0}));
        store.publish("host-last-seen", data).unwrap();

        let ctx = StepContext { knowledge: &store };
        let findings = detector.detect(&ctx).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].subject, "host-2");
        assert_eq!(findings[0].code, "stale-resource");
    }
}
