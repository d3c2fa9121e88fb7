use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::error::Result;
use crate::family::GlmFamily;

use super::{
    CommonParameters, ParameterSchema, non_negative, parse_bool, parse_list, parse_scalar,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum MissingValuesHandling {
    #[default]
    MeanImputation,
    Skip,
    PlugValues,
}

impl Display for MissingValuesHandling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MissingValuesHandling::MeanImputation => "MeanImputation",
            MissingValuesHandling::Skip => "Skip",
            MissingValuesHandling::PlugValues => "PlugValues",
        };
        write!(f, "{name}")
    }
}

impl FromStr for MissingValuesHandling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meanimputation" => Ok(MissingValuesHandling::MeanImputation),
            "skip" => Ok(MissingValuesHandling::Skip),
            "plugvalues" => Ok(MissingValuesHandling::PlugValues),
            other => Err(format!("unknown missing values handling '{other}'")),
        }
    }
}

/// Loss distribution for tree-based learners. `Auto` infers it from the
/// response column.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    #[default]
    Auto,
    Bernoulli,
    Multinomial,
    Gaussian,
    Poisson,
    Gamma,
    Tweedie,
    Laplace,
    Quantile,
    Huber,
}

impl FromStr for Distribution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Distribution::Auto),
            "bernoulli" => Ok(Distribution::Bernoulli),
            "multinomial" => Ok(Distribution::Multinomial),
            "gaussian" => Ok(Distribution::Gaussian),
            "poisson" => Ok(Distribution::Poisson),
            "gamma" => Ok(Distribution::Gamma),
            "tweedie" => Ok(Distribution::Tweedie),
            "laplace" => Ok(Distribution::Laplace),
            "quantile" => Ok(Distribution::Quantile),
            "huber" => Ok(Distribution::Huber),
            other => Err(format!("unknown distribution '{other}'")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    #[default]
    Rectifier,
    Tanh,
    Maxout,
    RectifierWithDropout,
    TanhWithDropout,
    MaxoutWithDropout,
    ExpRectifier,
}

impl FromStr for Activation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rectifier" => Ok(Activation::Rectifier),
            "tanh" => Ok(Activation::Tanh),
            "maxout" => Ok(Activation::Maxout),
            "rectifierwithdropout" => Ok(Activation::RectifierWithDropout),
            "tanhwithdropout" => Ok(Activation::TanhWithDropout),
            "maxoutwithdropout" => Ok(Activation::MaxoutWithDropout),
            "exprectifier" => Ok(Activation::ExpRectifier),
            other => Err(format!("unknown activation '{other}'")),
        }
    }
}

fn unit_interval(value: f64) -> bool {
    value > 0.0 && value <= 1.0
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Generalized linear model parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlmParameters {
    pub common: CommonParameters,
    pub family: GlmFamily,
    /// Elastic-net mixing values; empty lets the algorithm choose.
    pub alpha: Vec<f64>,
    /// Regularization strengths; empty lets the algorithm choose.
    pub lambda: Vec<f64>,
    pub lambda_search: bool,
    pub non_negative: bool,
    pub standardize: bool,
    pub early_stopping: bool,
    /// -1 lets the solver pick.
    pub max_iterations: i32,
    pub intercept: bool,
    pub missing_values_handling: MissingValuesHandling,
}

impl Default for GlmParameters {
    fn default() -> Self {
        Self {
            common: CommonParameters::default(),
            family: GlmFamily::Auto,
            alpha: Vec::new(),
            lambda: Vec::new(),
            lambda_search: false,
            non_negative: false,
            standardize: true,
            early_stopping: true,
            max_iterations: -1,
            intercept: true,
            missing_values_handling: MissingValuesHandling::default(),
        }
    }
}

impl ParameterSchema for GlmParameters {
    fn set_parameter(&mut self, key: &str, raw: &str) -> Result<()> {
        match key {
            "family" => self.family = parse_scalar(key, raw)?,
            "alpha" => self.alpha = parse_list(key, raw)?,
            "lambda" => self.lambda = parse_list(key, raw)?,
            "lambda_search" => self.lambda_search = parse_bool(key, raw)?,
            "non_negative" => self.non_negative = parse_bool(key, raw)?,
            "standardize" => self.standardize = parse_bool(key, raw)?,
            "early_stopping" => self.early_stopping = parse_bool(key, raw)?,
            "max_iterations" => self.max_iterations = parse_scalar(key, raw)?,
            "intercept" => self.intercept = parse_bool(key, raw)?,
            "missing_values_handling" => {
                self.missing_values_handling = parse_scalar(key, raw)?
            }
            _ => return self.common.set_parameter(key, raw),
        }
        Ok(())
    }
}

impl GlmParameters {
    pub(super) fn validation_messages(&self, messages: &mut Vec<String>) {
        if self.alpha.iter().any(|a| !(0.0..=1.0).contains(a)) {
            messages.push("alpha values must lie in [0, 1]".into());
        }
        if !self.lambda.iter().copied().all(non_negative) {
            messages.push("lambda values must be non-negative".into());
        }
        if self.max_iterations < -1 {
            messages.push("max_iterations must be -1 or non-negative".into());
        }
    }
}

/// Gradient-boosted trees parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GbmParameters {
    pub common: CommonParameters,
    pub ntrees: u32,
    pub max_depth: u32,
    pub min_rows: f64,
    pub learn_rate: f64,
    pub sample_rate: f64,
    pub col_sample_rate: f64,
    pub nbins: u32,
    pub stopping_rounds: u32,
    pub stopping_tolerance: f64,
    pub distribution: Distribution,
}

impl Default for GbmParameters {
    fn default() -> Self {
        Self {
            common: CommonParameters::default(),
            ntrees: 50,
            max_depth: 5,
            min_rows: 10.0,
            learn_rate: 0.1,
            sample_rate: 1.0,
            col_sample_rate: 1.0,
            nbins: 20,
            stopping_rounds: 0,
            stopping_tolerance: 0.001,
            distribution: Distribution::Auto,
        }
    }
}

impl ParameterSchema for GbmParameters {
    fn set_parameter(&mut self, key: &str, raw: &str) -> Result<()> {
        match key {
            "ntrees" => self.ntrees = parse_scalar(key, raw)?,
            "max_depth" => self.max_depth = parse_scalar(key, raw)?,
            "min_rows" => self.min_rows = parse_scalar(key, raw)?,
            "learn_rate" => self.learn_rate = parse_scalar(key, raw)?,
            "sample_rate" => self.sample_rate = parse_scalar(key, raw)?,
            "col_sample_rate" => self.col_sample_rate = parse_scalar(key, raw)?,
            "nbins" => self.nbins = parse_scalar(key, raw)?,
            "stopping_rounds" => self.stopping_rounds = parse_scalar(key, raw)?,
            "stopping_tolerance" => {
                self.stopping_tolerance = parse_scalar(key, raw)?
            }
            "distribution" => self.distribution = parse_scalar(key, raw)?,
            _ => return self.common.set_parameter(key, raw),
        }
        Ok(())
    }
}

impl GbmParameters {
    pub(super) fn validation_messages(&self, messages: &mut Vec<String>) {
        if self.ntrees == 0 {
            messages.push("ntrees must be at least 1".into());
        }
        if !unit_interval(self.learn_rate) {
            messages.push("learn_rate must lie in (0, 1]".into());
        }
        if !unit_interval(self.sample_rate) {
            messages.push("sample_rate must lie in (0, 1]".into());
        }
        if !unit_interval(self.col_sample_rate) {
            messages.push("col_sample_rate must lie in (0, 1]".into());
        }
        if self.nbins < 2 {
            messages.push("nbins must be at least 2".into());
        }
        if !positive(self.min_rows) {
            messages.push("min_rows must be positive".into());
        }
    }
}

/// Distributed random forest parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrfParameters {
    pub common: CommonParameters,
    pub ntrees: u32,
    pub max_depth: u32,
    pub min_rows: f64,
    /// -1 uses the square root (classification) or a third (regression) of
    /// the columns; -2 uses all columns.
    pub mtries: i32,
    pub sample_rate: f64,
    pub nbins: u32,
    pub binomial_double_trees: bool,
}

impl Default for DrfParameters {
    fn default() -> Self {
        Self {
            common: CommonParameters::default(),
            ntrees: 50,
            max_depth: 20,
            min_rows: 1.0,
            mtries: -1,
            sample_rate: 0.632,
            nbins: 20,
            binomial_double_trees: false,
        }
    }
}

impl ParameterSchema for DrfParameters {
    fn set_parameter(&mut self, key: &str, raw: &str) -> Result<()> {
        match key {
            "ntrees" => self.ntrees = parse_scalar(key, raw)?,
            "max_depth" => self.max_depth = parse_scalar(key, raw)?,
            "min_rows" => self.min_rows = parse_scalar(key, raw)?,
            "mtries" => self.mtries = parse_scalar(key, raw)?,
            "sample_rate" => self.sample_rate = parse_scalar(key, raw)?,
            "nbins" => self.nbins = parse_scalar(key, raw)?,
            "binomial_double_trees" => {
                self.binomial_double_trees = parse_bool(key, raw)?
            }
            _ => return self.common.set_parameter(key, raw),
        }
        Ok(())
    }
}

impl DrfParameters {
    pub(super) fn validation_messages(&self, messages: &mut Vec<String>) {
        if self.ntrees == 0 {
            messages.push("ntrees must be at least 1".into());
        }
        if !(self.mtries == -1 || self.mtries == -2 || self.mtries >= 1) {
            messages.push("mtries must be -1, -2 or at least 1".into());
        }
        if !unit_interval(self.sample_rate) {
            messages.push("sample_rate must lie in (0, 1]".into());
        }
        if self.nbins < 2 {
            messages.push("nbins must be at least 2".into());
        }
        if !positive(self.min_rows) {
            messages.push("min_rows must be positive".into());
        }
    }
}

/// Feed-forward network parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeepLearningParameters {
    pub common: CommonParameters,
    pub hidden: Vec<u32>,
    pub epochs: f64,
    pub activation: Activation,
    pub rate: f64,
    pub l1: f64,
    pub l2: f64,
    pub input_dropout_ratio: f64,
    pub adaptive_rate: bool,
    pub stopping_rounds: u32,
}

impl Default for DeepLearningParameters {
    fn default() -> Self {
        Self {
            common: CommonParameters::default(),
            hidden: vec![200, 200],
            epochs: 10.0,
            activation: Activation::Rectifier,
            rate: 0.005,
            l1: 0.0,
            l2: 0.0,
            input_dropout_ratio: 0.0,
            adaptive_rate: true,
            stopping_rounds: 5,
        }
    }
}

impl ParameterSchema for DeepLearningParameters {
    fn set_parameter(&mut self, key: &str, raw: &str) -> Result<()> {
        match key {
            "hidden" => self.hidden = parse_list(key, raw)?,
            "epochs" => self.epochs = parse_scalar(key, raw)?,
            "activation" => self.activation = parse_scalar(key, raw)?,
            "rate" => self.rate = parse_scalar(key, raw)?,
            "l1" => self.l1 = parse_scalar(key, raw)?,
            "l2" => self.l2 = parse_scalar(key, raw)?,
            "input_dropout_ratio" => {
                self.input_dropout_ratio = parse_scalar(key, raw)?
            }
            "adaptive_rate" => self.adaptive_rate = parse_bool(key, raw)?,
            "stopping_rounds" => self.stopping_rounds = parse_scalar(key, raw)?,
            _ => return self.common.set_parameter(key, raw),
        }
        Ok(())
    }
}

impl DeepLearningParameters {
    pub(super) fn validation_messages(&self, messages: &mut Vec<String>) {
        if self.hidden.is_empty() || self.hidden.contains(&0) {
            messages.push("hidden must list at least one non-empty layer".into());
        }
        if !positive(self.epochs) {
            messages.push("epochs must be positive".into());
        }
        if !positive(self.rate) {
            messages.push("rate must be positive".into());
        }
        if !non_negative(self.l1) || !non_negative(self.l2) {
            messages.push("l1 and l2 must be non-negative".into());
        }
        if !(0.0..1.0).contains(&self.input_dropout_ratio) {
            messages.push("input_dropout_ratio must lie in [0, 1)".into());
        }
    }
}
