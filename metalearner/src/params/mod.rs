//! Hyperparameter objects for every metalearner family.
//!
//! Each family has its own parameter struct sharing a [`CommonParameters`]
//! block. [`ModelParameters`] is the tagged union handed between the
//! orchestrator, the builders and the supervisor. Text overrides are applied
//! through [`ParameterSchema`], which knows each family's parameter names.

mod algorithms;
mod merge;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::algorithm::MetalearnerAlgorithm;
use crate::ensemble::DatasetKey;
use crate::error::{MetalearnerError, Result};
use crate::folds::FoldAssignmentScheme;

pub use algorithms::{
    Activation, DeepLearningParameters, Distribution, DrfParameters,
    GbmParameters, GlmParameters, MissingValuesHandling,
};
pub use merge::{OverrideDocument, composite_value, merge_overrides};
pub(crate) use merge::{parse_bool, parse_list, parse_scalar};

/// Parameter names set from the ensemble itself and never from overrides.
pub const ENSEMBLE_MANAGED_KEYS: [&str; 6] = [
    "training_frame",
    "validation_frame",
    "response_column",
    "nfolds",
    "fold_column",
    "fold_assignment",
];

/// Applies textual overrides to a parameter object by name.
pub trait ParameterSchema {
    /// Replace the parameter named `key` with the value parsed from `raw`.
    ///
    /// Unknown names and unparsable values fail with
    /// [`MetalearnerError::Configuration`] naming `key`.
    fn set_parameter(&mut self, key: &str, raw: &str) -> Result<()>;
}

/// Settings shared by every algorithm family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommonParameters {
    pub train: Option<DatasetKey>,
    pub valid: Option<DatasetKey>,
    pub response_column: Option<String>,
    pub nfolds: u32,
    pub fold_column: Option<String>,
    pub fold_assignment: Option<FoldAssignmentScheme>,
    pub seed: i64,
    pub max_runtime_secs: f64,
    pub keep_cross_validation_predictions: bool,
    pub score_each_iteration: bool,
}

impl Default for CommonParameters {
    fn default() -> Self {
        Self {
            train: None,
            valid: None,
            response_column: None,
            nfolds: 0,
            fold_column: None,
            fold_assignment: None,
            seed: -1,
            max_runtime_secs: 0.0,
            keep_cross_validation_predictions: false,
            score_each_iteration: false,
        }
    }
}

impl ParameterSchema for CommonParameters {
    fn set_parameter(&mut self, key: &str, raw: &str) -> Result<()> {
        match key {
            "seed" => self.seed = parse_scalar(key, raw)?,
            "max_runtime_secs" => self.max_runtime_secs = parse_scalar(key, raw)?,
            "keep_cross_validation_predictions" => {
                self.keep_cross_validation_predictions = parse_bool(key, raw)?
            }
            "score_each_iteration" => {
                self.score_each_iteration = parse_bool(key, raw)?
            }
            managed if ENSEMBLE_MANAGED_KEYS.contains(&managed) => {
                return Err(MetalearnerError::configuration(
                    key,
                    "set from the ensemble configuration and cannot be overridden",
                ));
            }
            _ => {
                return Err(MetalearnerError::configuration(
                    key,
                    "unknown parameter",
                ));
            }
        }
        Ok(())
    }
}

impl CommonParameters {
    fn validation_messages(&self, messages: &mut Vec<String>) {
        if self.train.is_none() {
            messages.push("training_frame is required".into());
        }
        if self.response_column.as_deref().is_none_or(str::is_empty) {
            messages.push("response_column is required".into());
        }
        if self.nfolds == 1 {
            messages.push("nfolds must be 0 or at least 2".into());
        }
        if self.nfolds > 1 && self.fold_column.is_some() {
            messages.push("nfolds cannot be combined with fold_column".into());
        }
        if !non_negative(self.max_runtime_secs) {
            messages.push("max_runtime_secs must be non-negative".into());
        }
    }
}

/// Finite and at least zero. NaN never passes.
pub(crate) fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Parameters for one metalearner family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum ModelParameters {
    Glm(GlmParameters),
    Gbm(GbmParameters),
    Drf(DrfParameters),
    DeepLearning(DeepLearningParameters),
}

impl ModelParameters {
    /// The builder's defaults for `algorithm`; `Auto` uses the generalized
    /// linear defaults.
    pub fn defaults_for(algorithm: MetalearnerAlgorithm) -> Self {
        match algorithm.builder_algorithm() {
            MetalearnerAlgorithm::Gbm => Self::Gbm(GbmParameters::default()),
            MetalearnerAlgorithm::Drf => Self::Drf(DrfParameters::default()),
            MetalearnerAlgorithm::DeepLearning => {
                Self::DeepLearning(DeepLearningParameters::default())
            }
            _ => Self::Glm(GlmParameters::default()),
        }
    }

    pub fn algorithm(&self) -> MetalearnerAlgorithm {
        match self {
            Self::Glm(_) => MetalearnerAlgorithm::Glm,
            Self::Gbm(_) => MetalearnerAlgorithm::Gbm,
            Self::Drf(_) => MetalearnerAlgorithm::Drf,
            Self::DeepLearning(_) => MetalearnerAlgorithm::DeepLearning,
        }
    }

    pub fn common(&self) -> &CommonParameters {
        match self {
            Self::Glm(p) => &p.common,
            Self::Gbm(p) => &p.common,
            Self::Drf(p) => &p.common,
            Self::DeepLearning(p) => &p.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut CommonParameters {
        match self {
            Self::Glm(p) => &mut p.common,
            Self::Gbm(p) => &mut p.common,
            Self::Drf(p) => &mut p.common,
            Self::DeepLearning(p) => &mut p.common,
        }
    }

    pub fn as_glm(&self) -> Option<&GlmParameters> {
        match self {
            Self::Glm(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_glm_mut(&mut self) -> Option<&mut GlmParameters> {
        match self {
            Self::Glm(p) => Some(p),
            _ => None,
        }
    }

    /// Constraint violations of the parameter object; empty when valid.
    pub fn validation_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        self.common().validation_messages(&mut messages);
        match self {
            Self::Glm(p) => p.validation_messages(&mut messages),
            Self::Gbm(p) => p.validation_messages(&mut messages),
            Self::Drf(p) => p.validation_messages(&mut messages),
            Self::DeepLearning(p) => p.validation_messages(&mut messages),
        }
        messages
    }
}

impl ParameterSchema for ModelParameters {
    fn set_parameter(&mut self, key: &str, raw: &str) -> Result<()> {
        match self {
            Self::Glm(p) => p.set_parameter(key, raw),
            Self::Gbm(p) => p.set_parameter(key, raw),
            Self::Drf(p) => p.set_parameter(key, raw),
            Self::DeepLearning(p) => p.set_parameter(key, raw),
        }
    }
}

/// Fully populated parameters, frozen once handed to the job supervisor.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedParameters {
    parameters: ModelParameters,
    overridden: BTreeSet<String>,
}

impl ResolvedParameters {
    pub fn new(parameters: ModelParameters, overridden: BTreeSet<String>) -> Self {
        Self {
            parameters,
            overridden,
        }
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.parameters
    }

    pub fn algorithm(&self) -> MetalearnerAlgorithm {
        self.parameters.algorithm()
    }

    /// Whether the user override document set `key`.
    pub fn is_overridden(&self, key: &str) -> bool {
        self.overridden.contains(key)
    }

    pub fn overridden_keys(&self) -> impl Iterator<Item = &str> {
        self.overridden.iter().map(String::as_str)
    }

    pub fn into_parameters(self) -> ModelParameters {
        self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_each_family() {
        assert_eq!(
            ModelParameters::defaults_for(MetalearnerAlgorithm::Auto).algorithm(),
            MetalearnerAlgorithm::Glm
        );
        for algorithm in [
            MetalearnerAlgorithm::Glm,
            MetalearnerAlgorithm::Gbm,
            MetalearnerAlgorithm::Drf,
            MetalearnerAlgorithm::DeepLearning,
        ] {
            assert_eq!(ModelParameters::defaults_for(algorithm).algorithm(), algorithm);
        }
    }

    #[test]
    fn test_common_keys_apply_to_every_family() {
        let mut params = ModelParameters::defaults_for(MetalearnerAlgorithm::DeepLearning);
        params.set_parameter("seed", "42").unwrap();
        params.set_parameter("score_each_iteration", "true").unwrap();
        assert_eq!(params.common().seed, 42);
        assert!(params.common().score_each_iteration);
    }

    #[test]
    fn test_ensemble_managed_keys_are_rejected() {
        let mut params = ModelParameters::defaults_for(MetalearnerAlgorithm::Gbm);
        for key in ENSEMBLE_MANAGED_KEYS {
            match params.set_parameter(key, "x") {
                Err(MetalearnerError::Configuration { key: got, reason }) => {
                    assert_eq!(got, key);
                    assert!(reason.contains("ensemble"));
                }
                other => panic!("expected configuration error for {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_defaults_need_dataset_and_response() {
        let params = ModelParameters::defaults_for(MetalearnerAlgorithm::Drf);
        let messages = params.validation_messages();
        assert!(messages.iter().any(|m| m.contains("training_frame")));
        assert!(messages.iter().any(|m| m.contains("response_column")));
    }

    #[test]
    fn test_populated_defaults_validate() {
        for algorithm in MetalearnerAlgorithm::ALL {
            let mut params = ModelParameters::defaults_for(algorithm);
            params.common_mut().train = Some(DatasetKey::new("levelone"));
            params.common_mut().response_column = Some("y".into());
            assert!(
                params.validation_messages().is_empty(),
                "{algorithm} defaults should validate: {:?}",
                params.validation_messages()
            );
        }
    }

    #[test]
    fn test_single_fold_is_rejected() {
        let mut params = ModelParameters::defaults_for(MetalearnerAlgorithm::Glm);
        params.common_mut().train = Some(DatasetKey::new("levelone"));
        params.common_mut().response_column = Some("y".into());
        params.common_mut().nfolds = 1;
        assert_eq!(
            params.validation_messages(),
            vec!["nfolds must be 0 or at least 2".to_string()]
        );
    }

    #[test]
    fn test_nan_runtime_is_rejected() {
        let mut params = ModelParameters::defaults_for(MetalearnerAlgorithm::Gbm);
        params.common_mut().train = Some(DatasetKey::new("levelone"));
        params.common_mut().response_column = Some("y".into());
        params.set_parameter("max_runtime_secs", "NaN").unwrap();
        assert_eq!(
            params.validation_messages(),
            vec!["max_runtime_secs must be non-negative".to_string()]
        );
    }

    #[test]
    fn test_resolved_parameters_track_overrides() {
        let resolved = ResolvedParameters::new(
            ModelParameters::defaults_for(MetalearnerAlgorithm::Glm),
            BTreeSet::from(["lambda_search".to_string()]),
        );
        assert!(resolved.is_overridden("lambda_search"));
        assert!(!resolved.is_overridden("early_stopping"));
        assert_eq!(resolved.algorithm(), MetalearnerAlgorithm::Glm);
        assert_eq!(resolved.overridden_keys().collect::<Vec<_>>(), vec!["lambda_search"]);
    }

    #[test]
    fn test_parameters_serialize_with_algorithm_tag() {
        let params = ModelParameters::defaults_for(MetalearnerAlgorithm::Gbm);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["algorithm"], "gbm");
        assert_eq!(json["ntrees"], 50);
    }
}
