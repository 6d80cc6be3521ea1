//! Top-level process settings: the document `cortexd` reads at startup.

use crate::error::Error;
use crate::knowledge::KnowledgeSpec;
use crate::pipeline::PipelineSpec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

fn default_admin_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("static address is valid")
}

const fn default_decision_history_capacity() -> usize {
    1024
}

const fn default_retry_base_delay() -> Duration {
    Duration::from_millis(50)
}

const fn default_retry_max_delay() -> Duration {
    Duration::from_secs(5)
}

const fn default_retry_max_attempts() -> u32 {
    5
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

/// The full settings document for a Cortex process: where to listen, which
/// knowledge tables and pipelines to load, and how aggressively to retry a
/// failed decision record.
///
/// This is the document passed via `cortexd --config <path>`. It composes
/// the finer-grained specs in this crate; the settings layer itself adds no
/// new declarative vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Settings {
    /// The address the HTTP admin/scheduler API binds to.
    #[serde(default = "default_admin_addr")]
    pub admin_addr: SocketAddr,

    /// Knowledge tables this process refreshes and makes available to
    /// pipeline steps.
    #[serde(default)]
    pub knowledge: Vec<KnowledgeSpec>,

    /// Pipelines this process serves.
    #[serde(default)]
    pub pipelines: Vec<PipelineSpec>,

    /// Retry policy applied to decision recording.
    #[serde(default)]
    pub decision_retry: RetryPolicy,

    /// Maximum number of decision records retained per pipeline before the
    /// oldest are evicted.
    #[serde(default = "default_decision_history_capacity")]
    pub decision_history_capacity: usize,

    /// Upper bound on how long a single scheduler API request may take,
    /// including the pipeline run it dispatches to. A request that exceeds
    /// this is cancelled cooperatively and answered with a `503`.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Settings {
    /// Parses a settings document from a YAML string.
    pub fn from_yaml(data: &str) -> Result<Self, Error> {
        serde_yaml::from_str(data).map_err(|e| Error::DeserializationError {
            format: "YAML".to_string(),
            details: e.to_string(),
        })
    }

    /// Parses a settings document from a JSON string.
    pub fn from_json(data: &str) -> Result<Self, Error> {
        serde_json::from_str(data).map_err(|e| Error::DeserializationError {
            format: "JSON".to_string(),
            details: e.to_string(),
        })
    }

    /// Loads and parses a settings document from a file, inferring the
    /// format from the extension (`.json` is parsed as JSON, anything else
    /// as YAML).
    pub fn from_file(path: &std::path::Path) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path).map_err(|e| Error::FileReadError {
            details: e.to_string(),
        })?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&data)
        } else {
            Self::from_yaml(&data)
        }
    }

    /// Validates every knowledge and pipeline spec in this document,
    /// collecting all failures rather than stopping at the first.
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        for knowledge in &self.knowledge {
            if let Err(e) = knowledge.validate() {
                errors.push(e);
            }
        }
        for pipeline in &self.pipelines {
            if let Err(e) = pipeline.validate() {
                errors.push(e);
            }
        }

        let mut seen = std::collections::HashSet::new();
        for pipeline in &self.pipelines {
            if !seen.insert(pipeline.name.clone()) {
                errors.push(Error::DuplicatePipelineName {
                    name: pipeline.name.clone(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfiguration { errors })
        }
    }
}

/// Retry policy for an operation that may fail transiently, such as
/// recording a decision to a remote store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first, before giving up.
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry. Subsequent delays double, capped at
    /// `max_delay`.
    #[serde(default = "default_retry_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,

    /// Upper bound on the backoff delay between attempts.
    #[serde(default = "default_retry_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            base_delay: default_retry_base_delay(),
            max_delay: default_retry_max_delay(),
        }
    }
}

impl RetryPolicy {
    /// Returns the backoff delay before the given attempt number (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scale = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        self.base_delay
            .saturating_mul(scale.try_into().unwrap_or(u32::MAX))
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_parse_from_empty_document() {
        let settings = Settings::from_yaml("{}").unwrap();
        assert_eq!(settings.admin_addr, default_admin_addr());
        assert!(settings.knowledge.is_empty());
        assert!(settings.pipelines.is_empty());
    }

    #[test]
    fn retry_delay_doubles_until_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(1));
    }

    #[test]
    fn settings_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"admin-addr": "127.0.0.1:9090"}"#).unwrap();
        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.admin_addr, "127.0.0.1:9090".parse().unwrap());
    }

    #[test]
    fn validate_rejects_duplicate_pipeline_names() {
        let yaml = r#"
pipelines:
  - name: dup
    domain: compute
    filters:
      - uses: knowledge-threshold-filter
        params: {}
  - name: dup
    domain: compute
    filters:
      - uses: knowledge-threshold-filter
        params: {}
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }
}
