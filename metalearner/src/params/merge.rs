use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{MetalearnerError, Result};

use super::{ModelParameters, ParameterSchema};

/// User-supplied metalearner overrides: parameter name to one or more values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverrideDocument {
    entries: BTreeMap<String, Vec<String>>,
}

impl OverrideDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object whose values are strings, numbers, booleans or
    /// arrays of those, e.g. `{"ntrees": ["100"], "hidden": [32, 16]}`.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|err| {
            MetalearnerError::configuration("<document>", err.to_string())
        })?;
        let Value::Object(map) = value else {
            return Err(MetalearnerError::configuration(
                "<document>",
                "expected a JSON object of parameter overrides",
            ));
        };

        let mut document = Self::new();
        for (key, value) in map {
            let values = match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| scalar_text(&key, item))
                    .collect::<Result<Vec<_>>>()?,
                scalar => vec![scalar_text(&key, scalar)?],
            };
            if values.is_empty() {
                return Err(MetalearnerError::configuration(
                    key,
                    "override has no values",
                ));
            }
            document.entries.insert(key, values);
        }
        Ok(document)
    }

    pub fn insert<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .insert(key.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }
}

fn scalar_text(key: &str, value: Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(MetalearnerError::configuration(
            key,
            format!("unsupported override value {other}"),
        )),
    }
}

/// Collapse override values into the single text form the parameter parser
/// accepts: one value stays as-is, several become `[v1, v2, ...]`.
pub fn composite_value(values: &[String]) -> String {
    match values {
        [single] => single.clone(),
        many => format!("[{}]", many.join(", ")),
    }
}

/// Apply an override document to an algorithm's defaults.
///
/// Every overridden key replaces its default; everything else is kept.
/// Applying the same document again yields the same parameters.
pub fn merge_overrides(
    defaults: &ModelParameters,
    overrides: &OverrideDocument,
) -> Result<ModelParameters> {
    let mut merged = defaults.clone();
    for (key, values) in overrides.iter() {
        merged.set_parameter(key, &composite_value(values))?;
    }
    Ok(merged)
}

pub(crate) fn parse_scalar<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse::<T>().map_err(|err| {
        MetalearnerError::configuration(key, format!("cannot parse '{raw}': {err}"))
    })
}

pub(crate) fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(MetalearnerError::configuration(
            key,
            format!("cannot parse '{raw}': expected true or false"),
        )),
    }
}

/// Parse either a single value or the composite `[v1, v2, ...]` form.
pub(crate) fn parse_list<T>(key: &str, raw: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);
    inner
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_scalar(key, item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::MetalearnerAlgorithm;
    use crate::family::GlmFamily;

    #[test]
    fn test_composite_value() {
        assert_eq!(composite_value(&["50".to_string()]), "50");
        assert_eq!(
            composite_value(&["10".to_string(), "20".to_string()]),
            "[10, 20]"
        );
    }

    #[test]
    fn test_parse_list_accepts_both_forms() {
        assert_eq!(parse_list::<u32>("hidden", "[32, 16]").unwrap(), vec![32, 16]);
        assert_eq!(parse_list::<u32>("hidden", "64").unwrap(), vec![64]);
        assert_eq!(parse_list::<f64>("alpha", "[]").unwrap(), Vec::<f64>::new());
        assert!(parse_list::<u32>("hidden", "[32, x]").is_err());
    }

    #[test]
    fn test_parse_bool_is_case_insensitive() {
        assert!(parse_bool("standardize", "TRUE").unwrap());
        assert!(!parse_bool("standardize", "False").unwrap());
        assert!(parse_bool("standardize", "yes").is_err());
    }

    #[test]
    fn test_document_from_json_mixed_values() {
        let doc = OverrideDocument::from_json(
            r#"{"ntrees": ["100"], "learn_rate": 0.05, "hidden": [32, 16], "standardize": false}"#,
        )
        .unwrap();
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.get("ntrees"), Some(&["100".to_string()][..]));
        assert_eq!(doc.get("learn_rate"), Some(&["0.05".to_string()][..]));
        assert_eq!(
            doc.get("hidden"),
            Some(&["32".to_string(), "16".to_string()][..])
        );
        assert_eq!(doc.get("standardize"), Some(&["false".to_string()][..]));
    }

    #[test]
    fn test_document_rejects_malformed_json() {
        let err = OverrideDocument::from_json("{ntrees: 5").unwrap_err();
        assert!(matches!(
            err,
            MetalearnerError::Configuration { ref key, .. } if key == "<document>"
        ));

        let err = OverrideDocument::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, MetalearnerError::Configuration { .. }));
    }

    #[test]
    fn test_document_rejects_nested_values() {
        let err =
            OverrideDocument::from_json(r#"{"hidden": [[1, 2]]}"#).unwrap_err();
        assert!(matches!(
            err,
            MetalearnerError::Configuration { ref key, .. } if key == "hidden"
        ));

        let err = OverrideDocument::from_json(r#"{"ntrees": []}"#).unwrap_err();
        assert!(matches!(
            err,
            MetalearnerError::Configuration { ref key, .. } if key == "ntrees"
        ));
    }

    #[test]
    fn test_merge_replaces_only_overridden_keys() {
        let defaults = ModelParameters::defaults_for(MetalearnerAlgorithm::Gbm);
        let doc = OverrideDocument::new().insert("max_depth", ["3"]);

        let merged = merge_overrides(&defaults, &doc).unwrap();
        let (ModelParameters::Gbm(merged), ModelParameters::Gbm(base)) = (&merged, &defaults)
        else {
            panic!("expected gbm parameters");
        };
        assert_eq!(merged.max_depth, 3);

        let mut expected = base.clone();
        expected.max_depth = 3;
        assert_eq!(merged, &expected);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let defaults = ModelParameters::defaults_for(MetalearnerAlgorithm::Glm);
        let doc = OverrideDocument::new()
            .insert("alpha", ["0.0", "0.5", "1.0"])
            .insert("family", ["poisson"])
            .insert("standardize", ["false"]);

        let once = merge_overrides(&defaults, &doc).unwrap();
        let twice = merge_overrides(&once, &doc).unwrap();
        assert_eq!(once, twice);

        let ModelParameters::Glm(glm) = once else {
            panic!("expected glm parameters");
        };
        assert_eq!(glm.alpha, vec![0.0, 0.5, 1.0]);
        assert_eq!(glm.family, GlmFamily::Poisson);
        assert!(!glm.standardize);
    }

    #[test]
    fn test_merge_unknown_key_names_key() {
        let defaults = ModelParameters::defaults_for(MetalearnerAlgorithm::Drf);
        let doc = OverrideDocument::new().insert("learn_rate", ["0.1"]);
        match merge_overrides(&defaults, &doc) {
            Err(MetalearnerError::Configuration { key, .. }) => {
                assert_eq!(key, "learn_rate")
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_bad_value_names_key() {
        let defaults = ModelParameters::defaults_for(MetalearnerAlgorithm::Gbm);
        let doc = OverrideDocument::new().insert("ntrees", ["50", "100"]);
        match merge_overrides(&defaults, &doc) {
            Err(MetalearnerError::Configuration { key, reason }) => {
                assert_eq!(key, "ntrees");
                assert!(reason.contains("[50, 100]"));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}
