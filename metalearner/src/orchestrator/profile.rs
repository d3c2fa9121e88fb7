use crate::algorithm::MetalearnerAlgorithm;
use crate::family::{FamilyRule, select_family};
use crate::params::ModelParameters;

/// Family-specific behaviour plugged into the shared training routine.
///
/// Adding a metalearner family means adding a profile here and registering a
/// builder for it; the orchestration sequence itself never changes.
#[derive(Clone, Copy, Debug)]
pub struct AlgorithmProfile {
    pub algorithm: MetalearnerAlgorithm,
    /// Whether a user override document is merged into the defaults.
    pub accepts_overrides: bool,
    /// Rule choosing the distributional family from the target category.
    pub family_rule: Option<FamilyRule>,
    /// Curated adjustments applied on top of the builder defaults.
    pub curate: Option<fn(&mut ModelParameters)>,
}

fn curate_auto(params: &mut ModelParameters) {
    if let Some(glm) = params.as_glm_mut() {
        glm.non_negative = true;
    }
}

pub const PROFILES: [AlgorithmProfile; 5] = [
    AlgorithmProfile {
        algorithm: MetalearnerAlgorithm::Auto,
        accepts_overrides: false,
        family_rule: Some(select_family),
        curate: Some(curate_auto),
    },
    AlgorithmProfile {
        algorithm: MetalearnerAlgorithm::Glm,
        accepts_overrides: true,
        family_rule: Some(select_family),
        curate: None,
    },
    AlgorithmProfile {
        algorithm: MetalearnerAlgorithm::Gbm,
        accepts_overrides: true,
        family_rule: None,
        curate: None,
    },
    AlgorithmProfile {
        algorithm: MetalearnerAlgorithm::Drf,
        accepts_overrides: true,
        family_rule: None,
        curate: None,
    },
    AlgorithmProfile {
        algorithm: MetalearnerAlgorithm::DeepLearning,
        accepts_overrides: true,
        family_rule: None,
        curate: None,
    },
];

/// Profile of `algorithm`.
pub fn profile(algorithm: MetalearnerAlgorithm) -> &'static AlgorithmProfile {
    match algorithm {
        MetalearnerAlgorithm::Auto => &PROFILES[0],
        MetalearnerAlgorithm::Glm => &PROFILES[1],
        MetalearnerAlgorithm::Gbm => &PROFILES[2],
        MetalearnerAlgorithm::Drf => &PROFILES[3],
        MetalearnerAlgorithm::DeepLearning => &PROFILES[4],
    }
}
