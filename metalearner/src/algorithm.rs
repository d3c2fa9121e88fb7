use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::error::MetalearnerError;

/// Second-stage algorithm family trained on the level-one dataset.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetalearnerAlgorithm {
    /// Curated generalized linear model with production defaults.
    Auto,
    /// Generalized linear model.
    Glm,
    /// Gradient-boosted trees.
    Gbm,
    /// Distributed random forest.
    Drf,
    /// Feed-forward neural network.
    DeepLearning,
}

impl MetalearnerAlgorithm {
    pub const ALL: [MetalearnerAlgorithm; 5] = [
        MetalearnerAlgorithm::Auto,
        MetalearnerAlgorithm::Glm,
        MetalearnerAlgorithm::Gbm,
        MetalearnerAlgorithm::Drf,
        MetalearnerAlgorithm::DeepLearning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetalearnerAlgorithm::Auto => "AUTO",
            MetalearnerAlgorithm::Glm => "glm",
            MetalearnerAlgorithm::Gbm => "gbm",
            MetalearnerAlgorithm::Drf => "drf",
            MetalearnerAlgorithm::DeepLearning => "deeplearning",
        }
    }

    /// The concrete family whose builder trains this algorithm.
    ///
    /// `Auto` is trained by the generalized linear builder.
    pub fn builder_algorithm(&self) -> MetalearnerAlgorithm {
        match self {
            MetalearnerAlgorithm::Auto => MetalearnerAlgorithm::Glm,
            other => *other,
        }
    }
}

impl Display for MetalearnerAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MetalearnerAlgorithm {
    type Err = MetalearnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(MetalearnerAlgorithm::Auto),
            "glm" => Ok(MetalearnerAlgorithm::Glm),
            "gbm" => Ok(MetalearnerAlgorithm::Gbm),
            "drf" => Ok(MetalearnerAlgorithm::Drf),
            "deeplearning" | "deep_learning" => {
                Ok(MetalearnerAlgorithm::DeepLearning)
            }
            other => Err(MetalearnerError::configuration(
                "metalearner_algorithm",
                format!("unknown algorithm '{other}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            "GBM".parse::<MetalearnerAlgorithm>().unwrap(),
            MetalearnerAlgorithm::Gbm
        );
        assert_eq!(
            "DeepLearning".parse::<MetalearnerAlgorithm>().unwrap(),
            MetalearnerAlgorithm::DeepLearning
        );
        assert_eq!(
            "auto".parse::<MetalearnerAlgorithm>().unwrap(),
            MetalearnerAlgorithm::Auto
        );
    }

    #[test]
    fn test_parse_unknown_algorithm() {
        let err = "xgboost".parse::<MetalearnerAlgorithm>().unwrap_err();
        assert!(matches!(
            err,
            MetalearnerError::Configuration { ref key, .. } if key == "metalearner_algorithm"
        ));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for algorithm in MetalearnerAlgorithm::ALL {
            let parsed: MetalearnerAlgorithm =
                algorithm.to_string().parse().unwrap();
            assert_eq!(parsed, algorithm);
        }
    }

    #[test]
    fn test_auto_trains_with_glm_builder() {
        assert_eq!(
            MetalearnerAlgorithm::Auto.builder_algorithm(),
            MetalearnerAlgorithm::Glm
        );
        assert_eq!(
            MetalearnerAlgorithm::Drf.builder_algorithm(),
            MetalearnerAlgorithm::Drf
        );
    }
}
