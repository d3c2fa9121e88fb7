use std::sync::Arc;

use tracing::Instrument;

use crate::ensemble::{DatasetKey, LevelOneDatasets};
use crate::error::{MetalearnerError, Result};
use crate::events::{EventMeta, TrainingEventBus, TrainingEventPayload};
use crate::model::{LockedEnsembleModel, TrainedModel};
use crate::store::DatasetStore;
use crate::telemetry;

/// What happened to the level-one datasets on the success path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Training dataset attached to the ensemble instead of removed.
    pub retained: Option<DatasetKey>,
    /// Datasets removed from the store, in removal order.
    pub released: Vec<DatasetKey>,
}

/// Disposes of level-one datasets and hands the ensemble model back to the
/// store.
///
/// Every path consumes both the datasets and the write-locked model, so each
/// dataset is removed at most once and the lock is released exactly once.
#[derive(Clone)]
pub struct ResourceLifecycle {
    store: Arc<dyn DatasetStore>,
    events: TrainingEventBus,
}

impl std::fmt::Debug for ResourceLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLifecycle")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl ResourceLifecycle {
    pub fn new(store: Arc<dyn DatasetStore>, events: TrainingEventBus) -> Self {
        Self { store, events }
    }

    /// Success path: attach the metalearner, retain or remove the training
    /// dataset, always remove the validation dataset, then persist and unlock.
    ///
    /// Store failures do not stop the sequence. The first one is returned
    /// after the model has been unlocked.
    pub async fn finalize(
        &self,
        model: LockedEnsembleModel,
        trained: &TrainedModel,
        datasets: LevelOneDatasets,
        keep_levelone_frame: bool,
        meta: &EventMeta,
    ) -> Result<FinalizeReport> {
        let span = telemetry::finalize_span(model.key().as_str(), keep_levelone_frame);
        self.finalize_inner(model, trained, datasets, keep_levelone_frame, meta)
            .instrument(span)
            .await
    }

    async fn finalize_inner(
        &self,
        mut model: LockedEnsembleModel,
        trained: &TrainedModel,
        datasets: LevelOneDatasets,
        keep_levelone_frame: bool,
        meta: &EventMeta,
    ) -> Result<FinalizeReport> {
        if let Err(err) = model.attach_metalearner(trained).await {
            tracing::error!(model = %model.key(), error = %err, "failed to attach metalearner");
            self.abandon(model, Some(datasets), keep_levelone_frame, meta)
                .await
                .ok();
            return Err(err);
        }

        let (training, validation) = datasets.into_parts();
        let mut report = FinalizeReport::default();
        let mut first_error: Option<MetalearnerError> = None;

        if keep_levelone_frame {
            match model.attach_retained_dataset(&training).await {
                Ok(()) => {
                    self.events.emit(
                        meta,
                        TrainingEventPayload::DatasetRetained {
                            key: training.clone(),
                        },
                    );
                    report.retained = Some(training);
                }
                Err(err) => {
                    tracing::warn!(dataset = %training, error = %err, "failed to retain level-one dataset");
                    first_error.get_or_insert(err);
                }
            }
        } else {
            match self.release(&training, "training", meta).await {
                Ok(()) => report.released.push(training),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(validation) = validation {
            match self.release(&validation, "validation", meta).await {
                Ok(()) => report.released.push(validation),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        let key = model.key().clone();
        model.persist_and_unlock().await?;
        self.events.emit(
            meta,
            TrainingEventPayload::ModelUnlocked {
                model: key,
                persisted: true,
            },
        );

        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Error path: release what the training owned and unlock without
    /// persisting.
    ///
    /// `datasets` is `None` when the failure happened before submission; the
    /// datasets then stay in the store for the caller.
    pub async fn abandon(
        &self,
        model: LockedEnsembleModel,
        datasets: Option<LevelOneDatasets>,
        keep_levelone_frame: bool,
        meta: &EventMeta,
    ) -> Result<()> {
        if let Some(datasets) = datasets {
            let (training, validation) = datasets.into_parts();
            if keep_levelone_frame {
                tracing::debug!(dataset = %training, "keeping level-one dataset after failure");
            } else {
                self.release(&training, "training", meta).await.ok();
            }
            if let Some(validation) = validation {
                self.release(&validation, "validation", meta).await.ok();
            }
        }

        let key = model.key().clone();
        let unlocked = model.unlock().await;
        if let Err(err) = &unlocked {
            tracing::error!(model = %key, error = %err, "failed to unlock ensemble model");
        } else {
            self.events.emit(
                meta,
                TrainingEventPayload::ModelUnlocked {
                    model: key,
                    persisted: false,
                },
            );
        }
        unlocked
    }

    async fn release(
        &self,
        key: &DatasetKey,
        role: &'static str,
        meta: &EventMeta,
    ) -> Result<()> {
        match self.store.remove(key).await {
            Ok(()) => {
                telemetry::record_dataset_released(key.as_str(), role);
                self.events.emit(
                    meta,
                    TrainingEventPayload::DatasetReleased { key: key.clone() },
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(dataset = %key, role, error = %err, "failed to remove level-one dataset");
                Err(MetalearnerError::collaborator("remove level-one dataset", err))
            }
        }
    }
}
