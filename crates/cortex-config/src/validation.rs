//! Validation helpers for step parameters.
//!
//! These helpers are intended for use by a step implementation's
//! `param_schema` in `cortex-registry`, which validates a [`StepSpec`]'s
//! `params` map before constructing the step.
//!
//! **Scope:** this module validates shape only — that required parameters
//! are present and of the expected [`ParamValue`] kind. It does not validate
//! cross-field or domain-specific constraints (e.g. "threshold must be
//! between 0 and 1"); those are the step implementation's own job.

use crate::error::Error;
use crate::step::{ParamValue, StepSpec};
use std::collections::BTreeMap;

/// Fetches a required parameter, applying `extract` to pull out the
/// expected [`ParamValue`] variant.
///
/// Returns [`Error::MissingParam`] if the key is absent, or
/// [`Error::BadParam`] if present but of the wrong kind.
pub fn required<'a, T>(
    step: &'a StepSpec,
    param: &str,
    extract: impl FnOnce(&'a ParamValue) -> Option<T>,
) -> Result<T, Error> {
    let Some(value) = step.params.get(param) else {
        return Err(Error::MissingParam {
            step: step.uses.clone(),
            param: param.to_string(),
        });
    };
    extract(value).ok_or_else(|| Error::BadParam {
        step: step.uses.clone(),
        param: param.to_string(),
        details: format!("expected a different type, got {}", value.kind_name()),
    })
}

/// Fetches an optional parameter, returning `default` if the key is absent.
///
/// Still returns [`Error::BadParam`] if the key is present but of the wrong
/// kind, so a typo'd value (e.g. a string where a float was meant) is never
/// silently treated as "absent".
pub fn optional<'a, T>(
    step: &'a StepSpec,
    param: &str,
    default: T,
    extract: impl FnOnce(&'a ParamValue) -> Option<T>,
) -> Result<T, Error> {
    match step.params.get(param) {
        None => Ok(default),
        Some(value) => extract(value).ok_or_else(|| Error::BadParam {
            step: step.uses.clone(),
            param: param.to_string(),
            details: format!("expected a different type, got {}", value.kind_name()),
        }),
    }
}

/// Validator for steps that accept **no** parameters.
///
/// Rejects any non-empty `params` map so a misplaced or typo'd parameter is
/// caught at pipeline-load time rather than silently ignored.
pub fn no_params(step: &StepSpec) -> Result<(), Error> {
    if step.params.is_empty() {
        Ok(())
    } else {
        Err(Error::BadParam {
            step: step.uses.clone(),
            param: step
                .params
                .keys()
                .next()
                .cloned()
                .unwrap_or_else(|| "<unknown>".to_string()),
            details: "this step does not accept parameters".to_string(),
        })
    }
}

/// Returns every key in `params` not present in `allowed`, for steps that
/// want to reject unrecognized parameters after pulling out the ones they
/// understand.
#[must_use]
pub fn unrecognized_keys<'a>(
    params: &'a BTreeMap<String, ParamValue>,
    allowed: &[&str],
) -> Vec<&'a str> {
    params
        .keys()
        .map(String::as_str)
        .filter(|k| !allowed.contains(k))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn step_with(params: BTreeMap<String, ParamValue>) -> StepSpec {
        StepSpec {
            uses: "knowledge-threshold-filter".into(),
            name: None,
            params,
            optional: false,
        }
    }

    #[test]
    fn required_fetches_typed_value() {
        let mut params = BTreeMap::new();
        params.insert("threshold".to_string(), ParamValue::Float(0.8));
        let step = step_with(params);
        let threshold: f64 = required(&step, "threshold", ParamValue::as_f64).unwrap();
        assert_eq!(threshold, 0.8);
    }

    #[test]
    fn required_errors_on_missing_key() {
        let step = step_with(BTreeMap::new());
        let err = required::<f64>(&step, "threshold", ParamValue::as_f64).unwrap_err();
        assert!(matches!(err, Error::MissingParam { .. }));
    }

    #[test]
    fn required_errors_on_wrong_kind() {
        let mut params = BTreeMap::new();
        params.insert("threshold".to_string(), ParamValue::String("high".to_string()));
        let step = step_with(params);
        let err = required::<f64>(&step, "threshold", ParamValue::as_f64).unwrap_err();
        assert!(matches!(err, Error::BadParam { .. }));
    }

    #[test]
    fn optional_falls_back_to_default() {
        let step = step_with(BTreeMap::new());
        let weight: f64 = optional(&step, "weight", 1.0, ParamValue::as_f64).unwrap();
        assert_eq!(weight, 1.0);
    }

    #[test]
    fn no_params_rejects_non_empty_map() {
        let mut params = BTreeMap::new();
        params.insert("unexpected".to_string(), ParamValue::Bool(true));
        let step = step_with(params);
        assert!(no_params(&step).is_err());
    }
}
