//! Knowledge table declarations.

use crate::error::Error;
use crate::{Description, KnowledgeName};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A declarative knowledge table: a named, periodically refreshed snapshot
/// of data steps can query during pipeline execution (e.g. per-host CPU
/// usage, per-host maintenance state).
///
/// This type only models the document; see `cortex-knowledge` for the
/// runtime store and `cortex-refresher` for the refresh loop that populates
/// it via a [`crate::step`]-external `Producer` implementation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct KnowledgeSpec {
    /// The table's name, unique within the process. Steps reference this
    /// name in their `params` to select which table to query.
    pub name: KnowledgeName,

    /// An operator-facing description of what this table holds.
    #[serde(default)]
    pub description: Option<Description>,

    /// Other knowledge tables this one's producer reads while building a
    /// snapshot. The refresher schedules refreshes so that a table is
    /// refreshed only after all of its dependencies have a published
    /// snapshot at least as new as its own last refresh.
    #[serde(default)]
    pub dependencies: Vec<KnowledgeName>,

    /// How often the refresher asks this table's producer for a new
    /// snapshot.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,

    /// When `true`, a refresh failure is logged but does not mark the table
    /// not-ready; the previous snapshot, if any, remains published. When
    /// `false`, a refresh failure clears readiness until the next
    /// successful refresh.
    #[serde(default)]
    pub tolerate_refresh_failure: bool,
}

impl KnowledgeSpec {
    /// Parses a knowledge spec from a JSON document.
    pub fn from_json(data: &str) -> Result<Self, Error> {
        serde_json::from_str(data).map_err(|e| Error::DeserializationError {
            format: "JSON".to_string(),
            details: e.to_string(),
        })
    }

    /// Parses a knowledge spec from a YAML document.
    pub fn from_yaml(data: &str) -> Result<Self, Error> {
        serde_yaml::from_str(data).map_err(|e| Error::DeserializationError {
            format: "YAML".to_string(),
            details: e.to_string(),
        })
    }

    /// Validates the structural invariants of this spec: a non-empty name
    /// and no self-referential dependency.
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(Error::EmptyKnowledgeName);
        }

        if self.dependencies.iter().any(|dep| dep == &self.name) {
            errors.push(Error::SelfReferentialKnowledge {
                name: self.name.clone(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfiguration { errors })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
name: host-cpu-usage
refresh-interval: 30s
dependencies: []
"#
    }

    #[test]
    fn parses_and_validates_sample_knowledge() {
        let spec = KnowledgeSpec::from_yaml(sample_yaml()).unwrap();
        assert_eq!(spec.refresh_interval, Duration::from_secs(30));
        spec.validate().unwrap();
    }

    #[test]
    fn rejects_self_referential_dependency() {
        let mut spec = KnowledgeSpec::from_yaml(sample_yaml()).unwrap();
        spec.dependencies.push(spec.name.clone());
        let err = spec.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }
}
