use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::folds::MetalearnerCrossValidation;
use crate::job::ParentJob;

/// Prediction-target category of the ensemble.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TargetCategory {
    Regression,
    Binomial,
    Multinomial,
    Ordinal,
    Clustering,
    AutoEncoder,
    DimReduction,
    AnomalyDetection,
    Unknown,
}

impl TargetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetCategory::Regression => "Regression",
            TargetCategory::Binomial => "Binomial",
            TargetCategory::Multinomial => "Multinomial",
            TargetCategory::Ordinal => "Ordinal",
            TargetCategory::Clustering => "Clustering",
            TargetCategory::AutoEncoder => "AutoEncoder",
            TargetCategory::DimReduction => "DimReduction",
            TargetCategory::AnomalyDetection => "AnomalyDetection",
            TargetCategory::Unknown => "Unknown",
        }
    }
}

impl Display for TargetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key of a dataset in the shared store.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetKey(String);

impl DatasetKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DatasetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DatasetKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DatasetKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The level-one training dataset and optional validation dataset.
///
/// Exclusively owned: the value is consumed when the datasets are retained or
/// released, so each key is disposed of at most once.
#[derive(Debug)]
pub struct LevelOneDatasets {
    training: DatasetKey,
    validation: Option<DatasetKey>,
}

impl LevelOneDatasets {
    pub fn new(training: impl Into<DatasetKey>) -> Self {
        Self {
            training: training.into(),
            validation: None,
        }
    }

    pub fn with_validation(mut self, validation: impl Into<DatasetKey>) -> Self {
        self.validation = Some(validation.into());
        self
    }

    pub fn training(&self) -> &DatasetKey {
        &self.training
    }

    pub fn validation(&self) -> Option<&DatasetKey> {
        self.validation.as_ref()
    }

    pub fn into_parts(self) -> (DatasetKey, Option<DatasetKey>) {
        (self.training, self.validation)
    }
}

/// Ensemble-level settings read by the metalearner orchestrator.
#[derive(Clone, Debug)]
pub struct EnsembleContext {
    /// Name of the true response column in the level-one dataset.
    pub response_column: String,
    /// Target category of the ensemble.
    pub target: TargetCategory,
    /// Cross-validation requested for the metalearner.
    pub cross_validation: MetalearnerCrossValidation,
    /// Keep the level-one training dataset attached to the ensemble model.
    pub keep_levelone_frame: bool,
    /// Ensemble-level job receiving progress and cancellation.
    pub parent: ParentJob,
}

impl EnsembleContext {
    pub fn new(
        response_column: impl Into<String>,
        target: TargetCategory,
        parent: ParentJob,
    ) -> Self {
        Self {
            response_column: response_column.into(),
            target,
            cross_validation: MetalearnerCrossValidation::default(),
            keep_levelone_frame: false,
            parent,
        }
    }

    pub fn with_cross_validation(
        mut self,
        cross_validation: MetalearnerCrossValidation,
    ) -> Self {
        self.cross_validation = cross_validation;
        self
    }

    pub fn with_keep_levelone_frame(mut self, keep: bool) -> Self {
        self.keep_levelone_frame = keep;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_one_datasets_parts() {
        let datasets = LevelOneDatasets::new("levelone_train").with_validation("levelone_valid");
        assert_eq!(datasets.training().as_str(), "levelone_train");
        assert_eq!(datasets.validation().map(DatasetKey::as_str), Some("levelone_valid"));

        let (training, validation) = datasets.into_parts();
        assert_eq!(training, DatasetKey::from("levelone_train"));
        assert_eq!(validation, Some(DatasetKey::from("levelone_valid")));
    }

    #[test]
    fn test_context_defaults() {
        let ctx = EnsembleContext::new("y", TargetCategory::Binomial, ParentJob::new("ensemble"));
        assert_eq!(ctx.response_column, "y");
        assert!(!ctx.keep_levelone_frame);
        assert!(ctx.cross_validation.fold_column.is_none());
        assert_eq!(ctx.cross_validation.nfolds, 0);
    }

    #[test]
    fn test_target_category_display() {
        assert_eq!(TargetCategory::Multinomial.to_string(), "Multinomial");
        assert_eq!(TargetCategory::AutoEncoder.to_string(), "AutoEncoder");
    }
}
