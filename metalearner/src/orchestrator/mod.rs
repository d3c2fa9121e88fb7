//! Top-level metalearner training.
//!
//! One routine drives every algorithm family. Family differences live in
//! [`AlgorithmProfile`]: whether overrides are merged, whether a
//! distributional family is selected, and any curated defaults.

mod builder;
mod profile;

pub use builder::MetalearnerOrchestratorBuilder;
pub use profile::{AlgorithmProfile, PROFILES, profile};

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::Instrument;

use crate::algorithm::MetalearnerAlgorithm;
use crate::builder::{AlgorithmBuilder, BuilderRegistry};
use crate::config::OrchestratorConfig;
use crate::ensemble::{EnsembleContext, LevelOneDatasets};
use crate::error::{MetalearnerError, Result};
use crate::events::{EventMeta, TrainingEventBus, TrainingEventPayload};
use crate::folds::resolve_fold_policy;
use crate::lifecycle::{FinalizeReport, ResourceLifecycle};
use crate::model::{LockedEnsembleModel, ModelKey};
use crate::params::{OverrideDocument, ResolvedParameters, merge_overrides};
use crate::store::DatasetStore;
use crate::supervisor::JobSupervisor;
use crate::telemetry;

/// Trains the second-stage model of a stacked ensemble.
#[derive(Clone, Debug)]
pub struct MetalearnerOrchestrator {
    config: OrchestratorConfig,
    builders: BuilderRegistry,
    supervisor: JobSupervisor,
    lifecycle: ResourceLifecycle,
    events: TrainingEventBus,
}

impl MetalearnerOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        builders: BuilderRegistry,
        store: Arc<dyn DatasetStore>,
        events: TrainingEventBus,
    ) -> Self {
        let supervisor = JobSupervisor::new(config.supervisor.clone(), events.clone());
        let lifecycle = ResourceLifecycle::new(store, events.clone());
        Self {
            config,
            builders,
            supervisor,
            lifecycle,
            events,
        }
    }

    pub fn builder(config: OrchestratorConfig) -> MetalearnerOrchestratorBuilder {
        MetalearnerOrchestratorBuilder::new(config)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn events(&self) -> &TrainingEventBus {
        &self.events
    }

    pub async fn train_generalized_linear(
        &self,
        ctx: &EnsembleContext,
        datasets: LevelOneDatasets,
        model: LockedEnsembleModel,
        overrides: Option<&OverrideDocument>,
    ) -> Result<FinalizeReport> {
        self.train(MetalearnerAlgorithm::Glm, ctx, datasets, model, overrides)
            .await
    }

    pub async fn train_gradient_boosted(
        &self,
        ctx: &EnsembleContext,
        datasets: LevelOneDatasets,
        model: LockedEnsembleModel,
        overrides: Option<&OverrideDocument>,
    ) -> Result<FinalizeReport> {
        self.train(MetalearnerAlgorithm::Gbm, ctx, datasets, model, overrides)
            .await
    }

    pub async fn train_random_forest(
        &self,
        ctx: &EnsembleContext,
        datasets: LevelOneDatasets,
        model: LockedEnsembleModel,
        overrides: Option<&OverrideDocument>,
    ) -> Result<FinalizeReport> {
        self.train(MetalearnerAlgorithm::Drf, ctx, datasets, model, overrides)
            .await
    }

    pub async fn train_network(
        &self,
        ctx: &EnsembleContext,
        datasets: LevelOneDatasets,
        model: LockedEnsembleModel,
        overrides: Option<&OverrideDocument>,
    ) -> Result<FinalizeReport> {
        self.train(
            MetalearnerAlgorithm::DeepLearning,
            ctx,
            datasets,
            model,
            overrides,
        )
        .await
    }

    /// Train the curated default metalearner. There is no override path.
    pub async fn train_auto(
        &self,
        ctx: &EnsembleContext,
        datasets: LevelOneDatasets,
        model: LockedEnsembleModel,
    ) -> Result<FinalizeReport> {
        self.train(MetalearnerAlgorithm::Auto, ctx, datasets, model, None)
            .await
    }

    /// Train `algorithm` on the level-one datasets and write the result into
    /// the locked ensemble `model`.
    ///
    /// The model is unlocked on every path. Errors raised while a job was in
    /// flight also release the datasets; earlier errors leave them alone.
    /// Any error is also reported to the parent job.
    ///
    /// Dropping the returned future once the job is submitted behaves like
    /// an in-flight failure: the job is cancelled, then the datasets are
    /// released and the model unlocked on a background task.
    pub async fn train(
        &self,
        algorithm: MetalearnerAlgorithm,
        ctx: &EnsembleContext,
        datasets: LevelOneDatasets,
        model: LockedEnsembleModel,
        overrides: Option<&OverrideDocument>,
    ) -> Result<FinalizeReport> {
        let meta = EventMeta::new(model.key().clone(), None);
        let span = telemetry::train_span(model.key().as_str(), algorithm.as_str());
        let timing = telemetry::record_training_start(algorithm.as_str());

        let result = self
            .train_inner(algorithm, ctx, datasets, model, overrides, &meta)
            .instrument(span)
            .await;

        match &result {
            Ok(_) => telemetry::record_training_end(timing, "success"),
            Err(err) => {
                ctx.parent.fail(err.status(), err.to_string());
                self.events.emit(
                    &meta,
                    TrainingEventPayload::Failed {
                        algorithm,
                        status: err.status().to_string(),
                        message: err.to_string(),
                    },
                );
                telemetry::record_training_end(timing, err.status());
            }
        }
        result
    }

    async fn train_inner(
        &self,
        algorithm: MetalearnerAlgorithm,
        ctx: &EnsembleContext,
        datasets: LevelOneDatasets,
        model: LockedEnsembleModel,
        overrides: Option<&OverrideDocument>,
        meta: &EventMeta,
    ) -> Result<FinalizeReport> {
        let builder = match self.builders.get(algorithm) {
            Ok(builder) => builder,
            Err(err) => return self.reject(model, err, meta).await,
        };
        let resolved =
            match self.resolve_parameters(algorithm, builder.as_ref(), ctx, &datasets, overrides) {
                Ok(resolved) => resolved,
                Err(err) => return self.reject(model, err, meta).await,
            };

        let model_key = ModelKey::metalearner(algorithm, model.key());
        let in_flight = InFlight::arm(
            self.lifecycle.clone(),
            model,
            datasets,
            ctx.keep_levelone_frame,
            meta.clone(),
        );
        let trained = self
            .supervisor
            .run(
                builder.as_ref(),
                model_key,
                resolved,
                &ctx.parent,
                algorithm,
                meta,
            )
            .await;
        let Some((model, datasets)) = in_flight.disarm() else {
            return Err(MetalearnerError::collaborator(
                "settle training job",
                anyhow::anyhow!("ensemble resources already released"),
            ));
        };

        match trained {
            Ok(trained) => {
                let job_model = trained.key.clone();
                let report = self
                    .lifecycle
                    .finalize(model, &trained, datasets, ctx.keep_levelone_frame, meta)
                    .await?;
                tracing::info!(
                    model = %job_model,
                    released = report.released.len(),
                    retained = report.retained.is_some(),
                    "metalearner attached to ensemble"
                );
                self.events.emit(
                    meta,
                    TrainingEventPayload::Completed {
                        algorithm,
                        model: job_model,
                    },
                );
                Ok(report)
            }
            Err(err) if err.is_in_flight() => {
                // Unlock failures are logged by the lifecycle; the training
                // error is what the caller sees.
                let _ = self
                    .lifecycle
                    .abandon(model, Some(datasets), ctx.keep_levelone_frame, meta)
                    .await;
                Err(err)
            }
            Err(err) => self.reject(model, err, meta).await,
        }
    }

    /// Resolve the parameters `algorithm` would be trained with, without
    /// submitting anything.
    pub fn resolve_parameters(
        &self,
        algorithm: MetalearnerAlgorithm,
        builder: &dyn AlgorithmBuilder,
        ctx: &EnsembleContext,
        datasets: &LevelOneDatasets,
        overrides: Option<&OverrideDocument>,
    ) -> Result<ResolvedParameters> {
        let profile = profile(algorithm);

        let mut params = builder.default_parameters();
        if let Some(curate) = profile.curate {
            curate(&mut params);
        }

        let mut overridden = BTreeSet::new();
        match overrides {
            Some(doc) if profile.accepts_overrides => {
                params = merge_overrides(&params, doc)?;
                overridden.extend(doc.keys().map(str::to_string));
            }
            Some(doc) if !doc.is_empty() => {
                tracing::warn!(
                    algorithm = %algorithm,
                    keys = doc.len(),
                    "ignoring overrides for curated metalearner"
                );
            }
            _ => {}
        }

        let common = params.common_mut();
        common.train = Some(datasets.training().clone());
        common.valid = datasets.validation().cloned();
        common.response_column = Some(ctx.response_column.clone());

        resolve_fold_policy(&ctx.cross_validation).apply(params.common_mut());

        if let Some(rule) = profile.family_rule {
            let family = rule(ctx.target)?;
            if let Some(glm) = params.as_glm_mut() {
                if !overridden.contains("family") {
                    glm.family = family;
                }
            }
        }

        builder
            .validate(&params)
            .map_err(|err| MetalearnerError::Validation {
                algorithm,
                messages: err.messages,
            })?;

        Ok(self.supervisor.prepare(params, overridden))
    }

    async fn reject(
        &self,
        model: LockedEnsembleModel,
        err: MetalearnerError,
        meta: &EventMeta,
    ) -> Result<FinalizeReport> {
        tracing::warn!(error = %err, "metalearner rejected before submission");
        let _ = self.lifecycle.abandon(model, None, false, meta).await;
        Err(err)
    }
}

/// Ownership of the model and datasets while a job may be running.
///
/// If the `train` future is dropped before the job settles, the guard hands
/// both to [`ResourceLifecycle::abandon`] on the current runtime. Dropping
/// the job handle inside the supervisor cancels the job itself.
struct InFlight {
    lifecycle: ResourceLifecycle,
    owned: Option<(LockedEnsembleModel, LevelOneDatasets)>,
    keep_levelone_frame: bool,
    meta: EventMeta,
}

impl InFlight {
    fn arm(
        lifecycle: ResourceLifecycle,
        model: LockedEnsembleModel,
        datasets: LevelOneDatasets,
        keep_levelone_frame: bool,
        meta: EventMeta,
    ) -> Self {
        Self {
            lifecycle,
            owned: Some((model, datasets)),
            keep_levelone_frame,
            meta,
        }
    }

    fn disarm(mut self) -> Option<(LockedEnsembleModel, LevelOneDatasets)> {
        self.owned.take()
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let Some((model, datasets)) = self.owned.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // The model's own drop logs the leaked lock.
            return;
        };
        tracing::warn!(
            model = %model.key(),
            "metalearner training dropped mid-flight, releasing resources"
        );
        let lifecycle = self.lifecycle.clone();
        let keep = self.keep_levelone_frame;
        let meta = self.meta.clone();
        handle.spawn(async move {
            let _ = lifecycle.abandon(model, Some(datasets), keep, &meta).await;
        });
    }
}
