//! Step declarations: the building blocks of a pipeline.

use crate::StepName;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed parameter value passed to a step at construction time.
///
/// Steps declare the shape they expect (e.g. "threshold must be a float");
/// the registry validates a [`StepSpec`]'s `params` map against that shape
/// before constructing the step. Untagged so operators write plain YAML/JSON
/// scalars and lists rather than `{"kind": "float", "value": 0.8}` envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ParamValue {
    /// A UTF-8 string parameter.
    String(String),
    /// A boolean parameter.
    Bool(bool),
    /// A signed integer parameter.
    Int(i64),
    /// A floating point parameter.
    Float(f64),
    /// A list of string parameters.
    ListOfStrings(Vec<String>),
    /// A map from name to weight, used by weighers that combine several
    /// named sub-scores.
    MapStringFloat(BTreeMap<String, f64>),
}

impl ParamValue {
    /// Returns this value as a `&str`, if it is a [`ParamValue::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns this value as a `bool`, if it is a [`ParamValue::Bool`].
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns this value as an `i64`, if it is a [`ParamValue::Int`].
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns this value as an `f64`, accepting either [`ParamValue::Float`]
    /// or [`ParamValue::Int`] (so operators may write `0.8` or `1` for a
    /// threshold without worrying about which scalar kind the YAML parser
    /// infers).
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns this value as a slice of strings, if it is a
    /// [`ParamValue::ListOfStrings`].
    #[must_use]
    pub fn as_list_of_strings(&self) -> Option<&[String]> {
        match self {
            Self::ListOfStrings(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Returns this value as a name-to-weight map, if it is a
    /// [`ParamValue::MapStringFloat`].
    #[must_use]
    pub const fn as_map_string_float(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            Self::MapStringFloat(m) => Some(m),
            _ => None,
        }
    }

    /// The name of this value's kind, for error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::ListOfStrings(_) => "list-of-strings",
            Self::MapStringFloat(_) => "map-string-float",
        }
    }
}

/// A single step within a pipeline: a reference to a registered
/// implementation plus the parameters it is constructed with.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    /// The implementation key this step resolves to in the step registry
    /// (e.g. `"knowledge-threshold-filter"`).
    pub uses: StepName,

    /// A human-readable name for this step instance, distinct from `uses`
    /// when a pipeline uses the same implementation more than once with
    /// different parameters (e.g. two threshold filters on different
    /// knowledge tables).
    #[serde(default)]
    pub name: Option<String>,

    /// Construction parameters, validated against the implementation's
    /// declared parameter schema before the step is built.
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,

    /// When `true`, a failure to construct or run this step is logged but
    /// does not fail the pipeline; the step is skipped as if absent. Useful
    /// for optional enrichment weighers during incremental rollout.
    #[serde(default)]
    pub optional: bool,
}

impl StepSpec {
    /// Returns the display name for this step: `name` if set, else `uses`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_param_accepts_integer_literal() {
        let v = ParamValue::Int(1);
        assert_eq!(v.as_f64(), Some(1.0));
    }

    #[test]
    fn step_spec_display_name_falls_back_to_uses() {
        let step: StepSpec = serde_json::from_str(
            r#"{"uses": "knowledge-threshold-filter", "params": {"threshold": 0.8}}"#,
        )
        .unwrap();
        assert_eq!(step.display_name(), "knowledge-threshold-filter");
        assert_eq!(step.params["threshold"].as_f64(), Some(0.8));
    }

    #[test]
    fn param_value_round_trips_map_string_float() {
        let mut map = BTreeMap::new();
        map.insert("cpu".to_string(), 0.5);
        map.insert("ram".to_string(), 0.5);
        let v = ParamValue::MapStringFloat(map);
        let json = serde_json::to_string(&v).unwrap();
        let back: ParamValue = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
