//! Error taxonomy for metalearner training.

use thiserror::Error;

use crate::algorithm::MetalearnerAlgorithm;
use crate::ensemble::TargetCategory;
use crate::job::AlgorithmError;

/// Errors raised while configuring, launching or finalizing a metalearner.
#[derive(Error, Debug)]
pub enum MetalearnerError {
    /// Override document is malformed, names an unknown parameter, or carries
    /// a value that cannot be converted to the parameter's type.
    #[error("invalid metalearner parameter '{key}': {reason}")]
    Configuration { key: String, reason: String },

    /// No metalearner family exists for the ensemble's target category.
    #[error("family {category} is not supported")]
    UnsupportedTarget { category: TargetCategory },

    /// The algorithm builder rejected the resolved parameters.
    #[error("{algorithm} metalearner parameters rejected: {}", .messages.join("; "))]
    Validation {
        algorithm: MetalearnerAlgorithm,
        messages: Vec<String>,
    },

    /// The wrapped algorithm failed while training. The source message is
    /// passed through untouched.
    #[error("{algorithm} metalearner training failed: {source}")]
    TrainingFailure {
        algorithm: MetalearnerAlgorithm,
        #[source]
        source: AlgorithmError,
    },

    /// The parent ensemble job was cancelled while the metalearner trained.
    #[error("{algorithm} metalearner training cancelled by parent job")]
    Cancelled { algorithm: MetalearnerAlgorithm },

    /// No builder is registered for the algorithm family.
    #[error("no builder registered for {algorithm} metalearner")]
    MissingBuilder { algorithm: MetalearnerAlgorithm },

    /// A shared collaborator (dataset store, job scheduler, model record)
    /// failed an infrastructure operation.
    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl MetalearnerError {
    pub(crate) fn configuration(
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn collaborator(
        operation: &'static str,
        source: anyhow::Error,
    ) -> Self {
        Self::Collaborator { operation, source }
    }

    /// Whether the error was raised while a training job was in flight.
    ///
    /// In-flight failures still own the level-one datasets and must release
    /// them; earlier failures never allocated a job.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::TrainingFailure { .. } | Self::Cancelled { .. })
    }

    /// Short status label used for telemetry.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::UnsupportedTarget { .. } => "unsupported_target",
            Self::Validation { .. } => "validation_error",
            Self::TrainingFailure { .. } => "training_failure",
            Self::Cancelled { .. } => "cancelled",
            Self::MissingBuilder { .. } => "missing_builder",
            Self::Collaborator { .. } => "collaborator_error",
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = MetalearnerError> = std::result::Result<T, E>;
