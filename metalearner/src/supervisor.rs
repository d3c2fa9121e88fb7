use std::collections::BTreeSet;

use tracing::Instrument;

use crate::algorithm::MetalearnerAlgorithm;
use crate::builder::AlgorithmBuilder;
use crate::config::SupervisorConfig;
use crate::error::{MetalearnerError, Result};
use crate::events::{EventMeta, TrainingEventBus, TrainingEventPayload};
use crate::job::{JobStatus, ParentJob, TrainingJobHandle};
use crate::model::{ModelKey, TrainedModel};
use crate::params::{ModelParameters, ResolvedParameters};
use crate::telemetry;

/// Submits a metalearner training job and waits for it, relaying progress
/// to the parent job.
#[derive(Clone, Debug)]
pub struct JobSupervisor {
    config: SupervisorConfig,
    events: TrainingEventBus,
}

impl JobSupervisor {
    pub fn new(config: SupervisorConfig, events: TrainingEventBus) -> Self {
        Self { config, events }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Freeze `parameters` for submission.
    ///
    /// Generalized linear parameters with a validation dataset get lambda
    /// search on and early stopping off, unless the user set either key.
    pub fn prepare(
        &self,
        mut parameters: ModelParameters,
        overridden: BTreeSet<String>,
    ) -> ResolvedParameters {
        let has_validation = parameters.common().valid.is_some();
        let user_tuned = overridden.contains("lambda_search")
            || overridden.contains("early_stopping");
        if let Some(glm) = parameters.as_glm_mut() {
            if has_validation && !user_tuned {
                glm.lambda_search = true;
                glm.early_stopping = false;
                tracing::debug!("validation dataset present, enabling lambda search");
            }
        }
        ResolvedParameters::new(parameters, overridden)
    }

    /// Status line reported to the parent job, e.g.
    /// `training metalearner(gbm)`.
    pub fn progress_message(&self, label: MetalearnerAlgorithm) -> String {
        format!("{}({})", self.config.progress_message_prefix, label)
    }

    /// Submit the job through `builder` and wait for its model.
    ///
    /// A submission error is reported as a collaborator failure: no job
    /// exists yet.
    pub async fn run(
        &self,
        builder: &dyn AlgorithmBuilder,
        model_key: ModelKey,
        resolved: ResolvedParameters,
        parent: &ParentJob,
        label: MetalearnerAlgorithm,
        meta: &EventMeta,
    ) -> Result<TrainedModel> {
        let handle = builder
            .train_async(model_key.clone(), resolved)
            .await
            .map_err(|err| MetalearnerError::collaborator("submit training job", err))?;

        tracing::info!(
            job_id = %handle.id(),
            model = %model_key,
            algorithm = %label,
            "metalearner training job submitted"
        );
        self.events.emit(
            meta,
            TrainingEventPayload::Submitted {
                job_id: handle.id(),
                algorithm: label,
                model: model_key,
            },
        );

        let span = telemetry::supervise_span(handle.id().to_string(), label.as_str());
        self.await_completion(handle, parent, label, meta)
            .instrument(span)
            .await
    }

    /// Poll `handle` until it finishes or the parent job is cancelled.
    ///
    /// Each tick re-reads the child's work estimate and sets it as the
    /// parent's progress. On parent cancellation the child is cancelled too.
    pub async fn await_completion(
        &self,
        mut handle: TrainingJobHandle,
        parent: &ParentJob,
        label: MetalearnerAlgorithm,
        meta: &EventMeta,
    ) -> Result<TrainedModel> {
        let message = self.progress_message(label);
        let interval = self.config.poll_interval();

        loop {
            match handle.poll_status() {
                JobStatus::Finished(Ok(model)) => {
                    parent.update(1.0, message.as_str());
                    return Ok(model);
                }
                JobStatus::Finished(Err(source)) => {
                    tracing::warn!(
                        job_id = %handle.id(),
                        algorithm = %label,
                        error = %source,
                        "metalearner training job failed"
                    );
                    return Err(MetalearnerError::TrainingFailure {
                        algorithm: label,
                        source,
                    });
                }
                JobStatus::Running(work) => {
                    let proportion = work.proportion();
                    tracing::debug!(job_id = %handle.id(), proportion, "metalearner poll tick");
                    parent.update(proportion, message.as_str());
                    telemetry::set_training_progress(label.as_str(), proportion);
                    self.events.emit(
                        meta,
                        TrainingEventPayload::Progress {
                            job_id: handle.id(),
                            work,
                        },
                    );
                }
            }

            tokio::select! {
                _ = parent.cancelled() => {
                    tracing::info!(
                        job_id = %handle.id(),
                        algorithm = %label,
                        "parent job cancelled, stopping metalearner training"
                    );
                    handle.cancel();
                    self.events.emit(
                        meta,
                        TrainingEventPayload::Cancelled {
                            job_id: handle.id(),
                            algorithm: label,
                        },
                    );
                    return Err(MetalearnerError::Cancelled { algorithm: label });
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::DatasetKey;
    use crate::job::{AlgorithmError, training_job};
    use crate::model::ModelMetrics;
    use std::time::Duration;
    use tokio::time::timeout;

    fn supervisor() -> JobSupervisor {
        JobSupervisor::new(
            SupervisorConfig::default().with_poll_interval(5),
            TrainingEventBus::new(64),
        )
    }

    fn meta() -> EventMeta {
        EventMeta::new(ModelKey::new("se_1"), None)
    }

    fn trained() -> TrainedModel {
        TrainedModel {
            key: ModelKey::new("metalearner_gbm_se_1"),
            algorithm: MetalearnerAlgorithm::Gbm,
            parameters: ModelParameters::defaults_for(MetalearnerAlgorithm::Gbm),
            metrics: ModelMetrics::default(),
        }
    }

    #[test]
    fn test_prepare_enables_lambda_search_with_validation() {
        let mut params = ModelParameters::defaults_for(MetalearnerAlgorithm::Glm);
        params.common_mut().valid = Some(DatasetKey::new("levelone_valid"));
        let resolved = supervisor().prepare(params, BTreeSet::new());
        let glm = resolved.parameters().as_glm().unwrap();
        assert!(glm.lambda_search);
        assert!(!glm.early_stopping);
    }

    #[test]
    fn test_prepare_respects_user_lambda_settings() {
        let mut params = ModelParameters::defaults_for(MetalearnerAlgorithm::Glm);
        params.common_mut().valid = Some(DatasetKey::new("levelone_valid"));
        let resolved = supervisor().prepare(
            params,
            BTreeSet::from(["early_stopping".to_string()]),
        );
        let glm = resolved.parameters().as_glm().unwrap();
        assert!(!glm.lambda_search);
        assert!(glm.early_stopping);
    }

    #[test]
    fn test_prepare_without_validation_is_untouched() {
        let params = ModelParameters::defaults_for(MetalearnerAlgorithm::Glm);
        let resolved = supervisor().prepare(params.clone(), BTreeSet::new());
        assert_eq!(resolved.parameters(), &params);
    }

    #[tokio::test]
    async fn test_progress_relayed_until_completion() {
        let supervisor = supervisor();
        let parent = ParentJob::new("ensemble");
        let (reporter, handle) = training_job(MetalearnerAlgorithm::Gbm, 10.0);

        let trainer = tokio::spawn(async move {
            for step in 1..=3 {
                reporter.report_work(step as f64 * 2.0);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            reporter.complete(trained());
        });

        let model = timeout(
            Duration::from_secs(5),
            supervisor.await_completion(handle, &parent, MetalearnerAlgorithm::Gbm, &meta()),
        )
        .await
        .expect("supervisor finished")
        .expect("training succeeded");
        trainer.await.unwrap();

        assert_eq!(model.key.as_str(), "metalearner_gbm_se_1");
        let progress = parent.progress();
        assert!(progress.updates >= 2);
        assert_eq!(progress.work, 1.0);
        assert_eq!(progress.message, "training metalearner(gbm)");
    }

    #[tokio::test]
    async fn test_training_failure_passes_through() {
        let supervisor = supervisor();
        let parent = ParentJob::new("ensemble");
        let (reporter, handle) = training_job(MetalearnerAlgorithm::Glm, 1.0);
        reporter.fail(AlgorithmError::convergence("IRLSM did not converge"));

        let err = supervisor
            .await_completion(handle, &parent, MetalearnerAlgorithm::Glm, &meta())
            .await
            .unwrap_err();
        match err {
            MetalearnerError::TrainingFailure { algorithm, source } => {
                assert_eq!(algorithm, MetalearnerAlgorithm::Glm);
                assert_eq!(source, AlgorithmError::convergence("IRLSM did not converge"));
            }
            other => panic!("expected TrainingFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_parent_cancellation_stops_wait_and_child() {
        let supervisor = supervisor();
        let parent = ParentJob::new("ensemble");
        let (reporter, handle) = training_job(MetalearnerAlgorithm::Drf, 1.0);

        let canceller = parent.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = timeout(
            Duration::from_secs(5),
            supervisor.await_completion(handle, &parent, MetalearnerAlgorithm::Drf, &meta()),
        )
        .await
        .expect("cancellation observed promptly")
        .unwrap_err();

        assert!(matches!(
            err,
            MetalearnerError::Cancelled { algorithm: MetalearnerAlgorithm::Drf }
        ));
        assert!(reporter.is_cancelled());
    }
}
