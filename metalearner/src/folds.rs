//! Cross-validation policy for the metalearner.
//!
//! The metalearner mirrors the ensemble's own cross-validation: an explicit
//! fold column wins, then a fold count with its assignment scheme, otherwise
//! no cross-validation at all. [`FoldPolicy`] makes the two modes mutually
//! exclusive by construction.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::params::CommonParameters;

/// Policy for partitioning rows into cross-validation folds.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum FoldAssignmentScheme {
    #[default]
    Auto,
    Random,
    Modulo,
    Stratified,
}

impl FoldAssignmentScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoldAssignmentScheme::Auto => "AUTO",
            FoldAssignmentScheme::Random => "Random",
            FoldAssignmentScheme::Modulo => "Modulo",
            FoldAssignmentScheme::Stratified => "Stratified",
        }
    }
}

impl Display for FoldAssignmentScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FoldAssignmentScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(FoldAssignmentScheme::Auto),
            "random" => Ok(FoldAssignmentScheme::Random),
            "modulo" => Ok(FoldAssignmentScheme::Modulo),
            "stratified" => Ok(FoldAssignmentScheme::Stratified),
            other => Err(format!("unknown fold assignment '{other}'")),
        }
    }
}

/// The ensemble's metalearner cross-validation settings, as configured.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetalearnerCrossValidation {
    /// Column holding an explicit fold id per row.
    pub fold_column: Option<String>,
    /// Number of folds; values below 2 disable cross-validation.
    pub nfolds: u32,
    /// Fold assignment scheme used with `nfolds`.
    pub fold_assignment: Option<FoldAssignmentScheme>,
}

impl MetalearnerCrossValidation {
    pub fn fold_column(column: impl Into<String>) -> Self {
        Self {
            fold_column: Some(column.into()),
            ..Self::default()
        }
    }

    pub fn folds(nfolds: u32) -> Self {
        Self {
            nfolds,
            ..Self::default()
        }
    }

    pub fn with_fold_assignment(mut self, scheme: FoldAssignmentScheme) -> Self {
        self.fold_assignment = Some(scheme);
        self
    }
}

/// Resolved cross-validation mode for the metalearner.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FoldPolicy {
    /// Reuse the ensemble's fold column.
    FoldColumn(String),
    /// Fold count with an assignment scheme.
    Folds {
        nfolds: u32,
        assignment: FoldAssignmentScheme,
    },
    /// Train on the full level-one dataset.
    NoCrossValidation,
}

impl FoldPolicy {
    /// Write the policy into the parameter object, clearing the fields that
    /// belong to the other modes.
    pub fn apply(&self, params: &mut CommonParameters) {
        match self {
            FoldPolicy::FoldColumn(column) => {
                params.fold_column = Some(column.clone());
                params.nfolds = 0;
                params.fold_assignment = None;
            }
            FoldPolicy::Folds { nfolds, assignment } => {
                params.fold_column = None;
                params.nfolds = *nfolds;
                params.fold_assignment = Some(*assignment);
            }
            FoldPolicy::NoCrossValidation => {
                params.fold_column = None;
                params.nfolds = 0;
                params.fold_assignment = None;
            }
        }
    }
}

/// Derive the metalearner's fold policy from the ensemble's settings.
pub fn resolve_fold_policy(cv: &MetalearnerCrossValidation) -> FoldPolicy {
    if let Some(column) = cv.fold_column.as_deref().filter(|c| !c.is_empty()) {
        return FoldPolicy::FoldColumn(column.to_string());
    }
    if cv.nfolds > 1 {
        return FoldPolicy::Folds {
            nfolds: cv.nfolds,
            assignment: cv.fold_assignment.unwrap_or_default(),
        };
    }
    FoldPolicy::NoCrossValidation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_column_takes_precedence() {
        let cv = MetalearnerCrossValidation {
            fold_column: Some("fold_id".into()),
            nfolds: 5,
            fold_assignment: Some(FoldAssignmentScheme::Modulo),
        };
        let policy = resolve_fold_policy(&cv);
        assert_eq!(policy, FoldPolicy::FoldColumn("fold_id".into()));

        let mut params = CommonParameters::default();
        params.nfolds = 3;
        policy.apply(&mut params);
        assert_eq!(params.fold_column.as_deref(), Some("fold_id"));
        assert_eq!(params.nfolds, 0);
        assert!(params.fold_assignment.is_none());
    }

    #[test]
    fn test_nfolds_defaults_assignment_to_auto() {
        let policy = resolve_fold_policy(&MetalearnerCrossValidation::folds(5));
        assert_eq!(
            policy,
            FoldPolicy::Folds {
                nfolds: 5,
                assignment: FoldAssignmentScheme::Auto
            }
        );
    }

    #[test]
    fn test_nfolds_propagates_assignment() {
        let cv = MetalearnerCrossValidation::folds(3)
            .with_fold_assignment(FoldAssignmentScheme::Stratified);
        let mut params = CommonParameters::default();
        resolve_fold_policy(&cv).apply(&mut params);
        assert_eq!(params.nfolds, 3);
        assert_eq!(params.fold_assignment, Some(FoldAssignmentScheme::Stratified));
        assert!(params.fold_column.is_none());
    }

    #[test]
    fn test_single_fold_means_no_cross_validation() {
        for nfolds in [0, 1] {
            let cv = MetalearnerCrossValidation::folds(nfolds)
                .with_fold_assignment(FoldAssignmentScheme::Random);
            assert_eq!(resolve_fold_policy(&cv), FoldPolicy::NoCrossValidation);
        }
    }

    #[test]
    fn test_empty_fold_column_is_ignored() {
        let cv = MetalearnerCrossValidation {
            fold_column: Some(String::new()),
            nfolds: 4,
            fold_assignment: None,
        };
        assert!(matches!(
            resolve_fold_policy(&cv),
            FoldPolicy::Folds { nfolds: 4, .. }
        ));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            "modulo".parse::<FoldAssignmentScheme>().unwrap(),
            FoldAssignmentScheme::Modulo
        );
        assert!("zigzag".parse::<FoldAssignmentScheme>().is_err());
    }
}
