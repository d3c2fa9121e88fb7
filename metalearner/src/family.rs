use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::ensemble::TargetCategory;
use crate::error::{MetalearnerError, Result};

/// Distributional family of a generalized linear model.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlmFamily {
    #[default]
    Auto,
    Gaussian,
    Binomial,
    Quasibinomial,
    Multinomial,
    Ordinal,
    Poisson,
    Gamma,
    Tweedie,
}

impl GlmFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlmFamily::Auto => "AUTO",
            GlmFamily::Gaussian => "gaussian",
            GlmFamily::Binomial => "binomial",
            GlmFamily::Quasibinomial => "quasibinomial",
            GlmFamily::Multinomial => "multinomial",
            GlmFamily::Ordinal => "ordinal",
            GlmFamily::Poisson => "poisson",
            GlmFamily::Gamma => "gamma",
            GlmFamily::Tweedie => "tweedie",
        }
    }
}

impl Display for GlmFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GlmFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(GlmFamily::Auto),
            "gaussian" => Ok(GlmFamily::Gaussian),
            "binomial" => Ok(GlmFamily::Binomial),
            "quasibinomial" => Ok(GlmFamily::Quasibinomial),
            "multinomial" => Ok(GlmFamily::Multinomial),
            "ordinal" => Ok(GlmFamily::Ordinal),
            "poisson" => Ok(GlmFamily::Poisson),
            "gamma" => Ok(GlmFamily::Gamma),
            "tweedie" => Ok(GlmFamily::Tweedie),
            other => Err(format!("unknown family '{other}'")),
        }
    }
}

/// Family-selection rule attached to an algorithm profile.
pub type FamilyRule = fn(TargetCategory) -> Result<GlmFamily>;

/// Map the ensemble's target category onto a generalized linear family.
///
/// Only regression, binomial and multinomial targets have a sound
/// metalearner family; everything else is a hard stop.
pub fn select_family(target: TargetCategory) -> Result<GlmFamily> {
    match target {
        TargetCategory::Regression => Ok(GlmFamily::Gaussian),
        TargetCategory::Binomial => Ok(GlmFamily::Binomial),
        TargetCategory::Multinomial => Ok(GlmFamily::Multinomial),
        category => Err(MetalearnerError::UnsupportedTarget { category }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_targets() {
        assert_eq!(
            select_family(TargetCategory::Regression).unwrap(),
            GlmFamily::Gaussian
        );
        assert_eq!(
            select_family(TargetCategory::Binomial).unwrap(),
            GlmFamily::Binomial
        );
        assert_eq!(
            select_family(TargetCategory::Multinomial).unwrap(),
            GlmFamily::Multinomial
        );
    }

    #[test]
    fn test_unsupported_targets_are_rejected() {
        for category in [
            TargetCategory::Ordinal,
            TargetCategory::Clustering,
            TargetCategory::AutoEncoder,
            TargetCategory::DimReduction,
            TargetCategory::AnomalyDetection,
            TargetCategory::Unknown,
        ] {
            match select_family(category) {
                Err(MetalearnerError::UnsupportedTarget { category: got }) => {
                    assert_eq!(got, category)
                }
                other => panic!("expected UnsupportedTarget, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_family() {
        assert_eq!("Binomial".parse::<GlmFamily>().unwrap(), GlmFamily::Binomial);
        assert_eq!("AUTO".parse::<GlmFamily>().unwrap(), GlmFamily::Auto);
        assert!("logistic".parse::<GlmFamily>().is_err());
    }
}
