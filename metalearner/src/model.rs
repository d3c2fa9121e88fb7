use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::algorithm::MetalearnerAlgorithm;
use crate::ensemble::DatasetKey;
use crate::error::{MetalearnerError, Result};
use crate::params::ModelParameters;

/// Key of a model in the shared store.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey(String);

impl ModelKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key of the metalearner trained for `ensemble`:
    /// `metalearner_<algorithm>_<ensemble key>`.
    pub fn metalearner(algorithm: MetalearnerAlgorithm, ensemble: &ModelKey) -> Self {
        Self(format!("metalearner_{}_{}", algorithm.as_str(), ensemble.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ModelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named metric values, e.g. `rmse` or `auc`.
pub type MetricSet = BTreeMap<String, f64>;

/// Metrics reported by a trained model per scoring dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub training: MetricSet,
    pub validation: Option<MetricSet>,
    pub cross_validation: Option<MetricSet>,
}

/// A metalearner produced by a finished training job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub key: ModelKey,
    pub algorithm: MetalearnerAlgorithm,
    pub parameters: ModelParameters,
    pub metrics: ModelMetrics,
}

/// The ensemble model record as seen by the orchestrator.
///
/// Implementations own the store-side write lock. The orchestrator only
/// reaches the record through [`LockedEnsembleModel`], which guarantees the
/// lock is released exactly once.
#[async_trait]
pub trait EnsembleModelRecord: Send + Sync {
    fn key(&self) -> &ModelKey;

    /// Attach the trained metalearner and copy its metrics onto the ensemble.
    async fn attach_metalearner(
        &mut self,
        model: &TrainedModel,
        metrics: &ModelMetrics,
    ) -> anyhow::Result<()>;

    /// Record the level-one training dataset as kept alongside the ensemble.
    async fn attach_retained_dataset(&mut self, key: &DatasetKey) -> anyhow::Result<()>;

    /// Persist the record's final state and release the write lock.
    async fn persist_and_unlock(&mut self) -> anyhow::Result<()>;

    /// Release the write lock without persisting.
    async fn unlock(&mut self) -> anyhow::Result<()>;
}

/// Write-locked ensemble model handed to the orchestrator.
///
/// Releasing consumes the value. Dropping it unreleased schedules an unlock
/// on the current runtime, so an abandoned training never keeps the lock.
pub struct LockedEnsembleModel {
    record: Option<Box<dyn EnsembleModelRecord>>,
    key: ModelKey,
}

impl std::fmt::Debug for LockedEnsembleModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedEnsembleModel")
            .field("key", &self.key)
            .field("released", &self.record.is_none())
            .finish()
    }
}

impl LockedEnsembleModel {
    pub fn new(record: Box<dyn EnsembleModelRecord>) -> Self {
        let key = record.key().clone();
        Self {
            record: Some(record),
            key,
        }
    }

    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    fn record_mut(&mut self) -> Result<&mut Box<dyn EnsembleModelRecord>> {
        self.record.as_mut().ok_or_else(|| {
            MetalearnerError::collaborator(
                "ensemble model access",
                anyhow::anyhow!("model {} already released", self.key),
            )
        })
    }

    pub async fn attach_metalearner(&mut self, model: &TrainedModel) -> Result<()> {
        let metrics = model.metrics.clone();
        self.record_mut()?
            .attach_metalearner(model, &metrics)
            .await
            .map_err(|err| MetalearnerError::collaborator("attach metalearner", err))
    }

    pub async fn attach_retained_dataset(&mut self, key: &DatasetKey) -> Result<()> {
        self.record_mut()?
            .attach_retained_dataset(key)
            .await
            .map_err(|err| MetalearnerError::collaborator("attach level-one dataset", err))
    }

    /// Persist and release. If persisting fails the lock is still released
    /// and the persist error is returned.
    pub async fn persist_and_unlock(mut self) -> Result<()> {
        let Some(mut record) = self.record.take() else {
            return Ok(());
        };
        match record.persist_and_unlock().await {
            Ok(()) => Ok(()),
            Err(err) => {
                if let Err(unlock_err) = record.unlock().await {
                    tracing::error!(
                        model = %self.key,
                        error = %unlock_err,
                        "failed to unlock ensemble model after persist error"
                    );
                }
                Err(MetalearnerError::collaborator("persist ensemble model", err))
            }
        }
    }

    /// Release without persisting.
    pub async fn unlock(mut self) -> Result<()> {
        let Some(mut record) = self.record.take() else {
            return Ok(());
        };
        record
            .unlock()
            .await
            .map_err(|err| MetalearnerError::collaborator("unlock ensemble model", err))
    }
}

impl Drop for LockedEnsembleModel {
    /// Dropping a still-locked model hands the unlock to the current tokio
    /// runtime. Outside a runtime the lock leaks and only a warning remains.
    fn drop(&mut self) {
        let Some(mut record) = self.record.take() else {
            return;
        };
        let key = self.key.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(model = %key, "ensemble model dropped while locked, unlocking in background");
                handle.spawn(async move {
                    if let Err(err) = record.unlock().await {
                        tracing::error!(model = %key, error = %err, "failed to unlock dropped ensemble model");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(model = %key, "ensemble model dropped while locked outside a runtime");
            }
        }
    }
}
