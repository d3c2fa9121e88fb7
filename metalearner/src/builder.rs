use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::algorithm::MetalearnerAlgorithm;
use crate::error::{MetalearnerError, Result};
use crate::job::TrainingJobHandle;
use crate::model::ModelKey;
use crate::params::{ModelParameters, ResolvedParameters};

/// Constraint violations reported by a builder's validation pass.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{}", .messages.join("; "))]
pub struct ValidationError {
    pub messages: Vec<String>,
}

impl ValidationError {
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }
}

/// Factory for one learning algorithm family.
///
/// A builder supplies the family's defaults, checks a parameter object and
/// launches an asynchronous training job. Builders are shared across
/// trainings and must not keep per-training state.
#[async_trait]
pub trait AlgorithmBuilder: Send + Sync {
    /// The concrete family this builder trains.
    fn algorithm(&self) -> MetalearnerAlgorithm;

    fn default_parameters(&self) -> ModelParameters {
        ModelParameters::defaults_for(self.algorithm())
    }

    /// Check `params` against the family's constraints.
    fn validate(&self, params: &ModelParameters) -> Result<(), ValidationError> {
        let mut messages = params.validation_messages();
        if params.algorithm() != self.algorithm() {
            messages.push(format!(
                "{} builder cannot train {} parameters",
                self.algorithm(),
                params.algorithm()
            ));
        }
        if messages.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(messages))
        }
    }

    /// Submit a training job producing the model stored under `model_key`.
    ///
    /// An error here means no job was started.
    async fn train_async(
        &self,
        model_key: ModelKey,
        params: ResolvedParameters,
    ) -> anyhow::Result<TrainingJobHandle>;
}

/// Builders available to the orchestrator, one per concrete family.
#[derive(Clone, Default)]
pub struct BuilderRegistry {
    builders: HashMap<MetalearnerAlgorithm, Arc<dyn AlgorithmBuilder>>,
}

impl fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut algorithms: Vec<_> = self.builders.keys().map(|a| a.as_str()).collect();
        algorithms.sort_unstable();
        f.debug_struct("BuilderRegistry")
            .field("algorithms", &algorithms)
            .finish()
    }
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `builder` under the family it reports, replacing any earlier
    /// registration.
    pub fn register(&mut self, builder: Arc<dyn AlgorithmBuilder>) {
        self.builders.insert(builder.algorithm(), builder);
    }

    pub fn with_builder(mut self, builder: Arc<dyn AlgorithmBuilder>) -> Self {
        self.register(builder);
        self
    }

    /// Builder training `algorithm`; `Auto` resolves to the linear builder.
    pub fn get(&self, algorithm: MetalearnerAlgorithm) -> Result<Arc<dyn AlgorithmBuilder>> {
        self.builders
            .get(&algorithm.builder_algorithm())
            .cloned()
            .ok_or(MetalearnerError::MissingBuilder { algorithm })
    }

    pub fn contains(&self, algorithm: MetalearnerAlgorithm) -> bool {
        self.builders.contains_key(&algorithm.builder_algorithm())
    }
}
