//! Pipeline declarations.

use crate::error::Error;
use crate::step::StepSpec;
use crate::{Description, PipelineName, SchedulingDomain};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The shape of pipeline a [`PipelineSpec`] describes.
///
/// A `filter-weigher` pipeline narrows then ranks admission candidates for a
/// scheduling request. A `detector` pipeline has no request to answer; it
/// runs periodically over the current knowledge snapshot and emits findings
/// (e.g. "host X is stale"), consumed by operators or other automation
/// rather than by the scheduler API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineKind {
    /// Filters candidates, then weighs and ranks the survivors.
    FilterWeigher,
    /// Runs detectors over knowledge on a schedule; produces no placement
    /// decision.
    Detector,
}

/// A declarative pipeline: an ordered composition of steps plus the domain
/// it applies to.
///
/// This type only models the document; see `cortex-registry` for resolving
/// `uses` references against concrete step implementations and
/// `cortex-engine` for executing the resulting runtime pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PipelineSpec {
    /// The pipeline's name, unique within the process. Scheduling requests
    /// name a pipeline explicitly or fall back to
    /// [`SchedulingDomain::default_pipeline_name`].
    pub name: PipelineName,

    /// The scheduling domain this pipeline serves.
    pub domain: SchedulingDomain,

    /// The kind of pipeline this is.
    #[serde(default = "default_pipeline_kind")]
    pub kind: PipelineKind,

    /// An operator-facing description of what this pipeline does.
    #[serde(default)]
    pub description: Option<Description>,

    /// When `true`, the engine skips its own candidate preselection and
    /// instead hands every candidate named in the request's
    /// `ignore-preselection` host list directly to the filter chain.
    #[serde(default)]
    pub ignore_preselection: bool,

    /// When `true` (the default), every run of this pipeline emits a
    /// [decision record](https://github.com/cobaltcore-dev/cortex) via the
    /// decision recorder before the scheduler API responds. Operators set
    /// this to `false` for high-frequency or exploratory pipelines where
    /// the audit trail isn't needed.
    #[serde(default = "default_create_decisions")]
    pub create_decisions: bool,

    /// Filter steps, run in order; a candidate surviving every filter moves
    /// on to weighing. Valid for [`PipelineKind::FilterWeigher`] pipelines.
    #[serde(default)]
    pub filters: Vec<StepSpec>,

    /// Weigher steps, each run over every surviving candidate and combined
    /// by summing normalized, per-weigher-multiplied scores. Valid for
    /// [`PipelineKind::FilterWeigher`] pipelines.
    #[serde(default)]
    pub weighers: Vec<StepSpec>,

    /// Detector steps, run in order over the current knowledge snapshot.
    /// Valid for [`PipelineKind::Detector`] pipelines.
    #[serde(default)]
    pub detectors: Vec<StepSpec>,

    /// How often the controller re-runs this pipeline's detectors. Ignored
    /// by [`PipelineKind::FilterWeigher`] pipelines, which run on demand
    /// instead of on a schedule.
    #[serde(default = "default_detect_interval", with = "humantime_serde")]
    pub detect_interval: Duration,
}

const fn default_pipeline_kind() -> PipelineKind {
    PipelineKind::FilterWeigher
}

const fn default_create_decisions() -> bool {
    true
}

const fn default_detect_interval() -> Duration {
    Duration::from_secs(300)
}

impl PipelineSpec {
    /// Parses a pipeline spec from a JSON document.
    pub fn from_json(data: &str) -> Result<Self, Error> {
        serde_json::from_str(data).map_err(|e| Error::DeserializationError {
            format: "JSON".to_string(),
            details: e.to_string(),
        })
    }

    /// Parses a pipeline spec from a YAML document.
    pub fn from_yaml(data: &str) -> Result<Self, Error> {
        serde_yaml::from_str(data).map_err(|e| Error::DeserializationError {
            format: "YAML".to_string(),
            details: e.to_string(),
        })
    }

    /// Validates the structural invariants of this spec: a non-empty name
    /// and a step list matching its declared [`PipelineKind`].
    ///
    /// This does not validate individual steps' `params` against their
    /// implementation's schema; that requires the step registry and is done
    /// by `cortex-registry` when the pipeline is resolved into a runtime
    /// pipeline.
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(Error::EmptyPipelineName);
        }

        match self.kind {
            PipelineKind::FilterWeigher => {
                if self.filters.is_empty() && self.weighers.is_empty() {
                    errors.push(Error::EmptyPipelineSteps {
                        name: self.name.clone(),
                    });
                }
            }
            PipelineKind::Detector => {
                if self.detectors.is_empty() {
                    errors.push(Error::EmptyDetectorSteps {
                        name: self.name.clone(),
                    });
                }
            }
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
name: nova-external-scheduler
domain: compute
filters:
  - uses: knowledge-threshold-filter
    params:
      knowledge: host-cpu-usage
      threshold: 0.9
weighers:
  - uses: static-weight-weigher
    params:
      weight: 1.0
"#
    }

    #[test]
    fn parses_and_validates_sample_pipeline() {
        let spec = PipelineSpec::from_yaml(sample_yaml()).unwrap();
        assert_eq!(spec.domain, SchedulingDomain::Compute);
        assert_eq!(spec.kind, PipelineKind::FilterWeigher);
        assert_eq!(spec.filters.len(), 1);
        spec.validate().unwrap();
    }

    #[test]
    fn rejects_empty_name() {
        let mut spec = PipelineSpec::from_yaml(sample_yaml()).unwrap();
        spec.name = "".into();
        let err = spec.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }

    #[test]
    fn rejects_filter_weigher_pipeline_with_no_steps() {
        let spec = PipelineSpec {
            name: "empty".into(),
            domain: SchedulingDomain::Compute,
            kind: PipelineKind::FilterWeigher,
            description: None,
            ignore_preselection: false,
            create_decisions: true,
            filters: vec![],
            weighers: vec![],
            detectors: vec![],
            detect_interval: std::time::Duration::from_secs(300),
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn rejects_detector_pipeline_with_no_detectors() {
        let spec = PipelineSpec {
            name: "detectors".into(),
            domain: SchedulingDomain::Compute,
            kind: PipelineKind::Detector,
            description: None,
            ignore_preselection: false,
            create_decisions: true,
            filters: vec![],
            weighers: vec![],
            detectors: vec![],
            detect_interval: std::time::Duration::from_secs(300),
        };
        assert!(spec.validate().is_err());
    }
}
