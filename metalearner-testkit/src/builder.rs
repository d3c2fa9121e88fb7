use async_trait::async_trait;
use metalearner::{
    AlgorithmBuilder, AlgorithmError, MetalearnerAlgorithm, ModelKey, ModelMetrics, ModelParameters,
    ResolvedParameters, TrainedModel, TrainingJobHandle, TrainingJobReporter, ValidationError,
    training_job,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How a job submitted to a [`ScriptedBuilder`] behaves.
#[derive(Clone, Debug)]
pub enum TrainingScript {
    /// Report `steps` units of work, then finish with `metrics`.
    Succeed {
        steps: u32,
        step_delay: Duration,
        metrics: ModelMetrics,
    },
    /// Report `steps` units of work, then fail with `error`.
    Fail {
        steps: u32,
        step_delay: Duration,
        error: AlgorithmError,
    },
    /// Keep running until the job is cancelled.
    RunUntilCancelled,
    /// Drop the job without reporting any outcome.
    DropWithoutResult,
    /// Refuse the submission itself.
    RejectSubmission(String),
}

/// A job accepted by a [`ScriptedBuilder`].
#[derive(Clone, Debug)]
pub struct Submission {
    pub model_key: ModelKey,
    pub parameters: ResolvedParameters,
}

/// Algorithm builder whose training jobs follow a [`TrainingScript`].
///
/// Jobs run on spawned tokio tasks, so a runtime must be active.
#[derive(Clone)]
pub struct ScriptedBuilder {
    algorithm: MetalearnerAlgorithm,
    script: Arc<Mutex<TrainingScript>>,
    submissions: Arc<Mutex<Vec<Submission>>>,
    rejections: Arc<Mutex<Vec<String>>>,
    cancellations: Arc<AtomicUsize>,
}

impl ScriptedBuilder {
    pub fn new(algorithm: MetalearnerAlgorithm, script: TrainingScript) -> Self {
        Self {
            algorithm,
            script: Arc::new(Mutex::new(script)),
            submissions: Arc::new(Mutex::new(Vec::new())),
            rejections: Arc::new(Mutex::new(Vec::new())),
            cancellations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Three quick steps, then success.
    pub fn succeeding(algorithm: MetalearnerAlgorithm) -> Self {
        Self::new(
            algorithm,
            TrainingScript::Succeed {
                steps: 3,
                step_delay: Duration::from_millis(5),
                metrics: ModelMetrics::default(),
            },
        )
    }

    /// One step, then `error`.
    pub fn failing(algorithm: MetalearnerAlgorithm, error: AlgorithmError) -> Self {
        Self::new(
            algorithm,
            TrainingScript::Fail {
                steps: 1,
                step_delay: Duration::from_millis(5),
                error,
            },
        )
    }

    pub fn set_script(&self, script: TrainingScript) {
        *self.script.lock() = script;
    }

    /// Add a constraint violation reported by `validate`.
    pub fn reject_with(&self, message: impl Into<String>) {
        self.rejections.lock().push(message.into());
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    pub fn last_submission(&self) -> Option<Submission> {
        self.submissions.lock().last().cloned()
    }

    /// Number of jobs that stopped because they were cancelled.
    pub fn cancellation_count(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    pub fn assert_submission_count_eq(&self, expected: usize) {
        let actual = self.submissions.lock().len();
        assert_eq!(
            actual, expected,
            "Expected {expected} submissions, got {actual}"
        );
    }
}

async fn run_steps(
    reporter: &TrainingJobReporter,
    steps: u32,
    step_delay: Duration,
) -> bool {
    for step in 1..=steps {
        tokio::select! {
            _ = reporter.cancelled() => return false,
            _ = tokio::time::sleep(step_delay) => {}
        }
        reporter.report_work(f64::from(step));
    }
    true
}

#[async_trait]
impl AlgorithmBuilder for ScriptedBuilder {
    fn algorithm(&self) -> MetalearnerAlgorithm {
        self.algorithm
    }

    fn validate(&self, params: &ModelParameters) -> Result<(), ValidationError> {
        let mut messages = params.validation_messages();
        messages.extend(self.rejections.lock().iter().cloned());
        if messages.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(messages))
        }
    }

    async fn train_async(
        &self,
        model_key: ModelKey,
        params: ResolvedParameters,
    ) -> anyhow::Result<TrainingJobHandle> {
        let script = self.script.lock().clone();
        if let TrainingScript::RejectSubmission(reason) = &script {
            anyhow::bail!("scheduler rejected job: {reason}");
        }

        self.submissions.lock().push(Submission {
            model_key: model_key.clone(),
            parameters: params.clone(),
        });

        let total = match &script {
            TrainingScript::Succeed { steps, .. } | TrainingScript::Fail { steps, .. } => {
                f64::from(*steps)
            }
            _ => 1.0,
        };
        let (reporter, handle) = training_job(params.algorithm(), total);
        let cancellations = self.cancellations.clone();

        tokio::spawn(async move {
            match script {
                TrainingScript::Succeed {
                    steps,
                    step_delay,
                    metrics,
                } => {
                    if !run_steps(&reporter, steps, step_delay).await {
                        cancellations.fetch_add(1, Ordering::SeqCst);
                        reporter.fail(AlgorithmError::other("job cancelled"));
                        return;
                    }
                    let algorithm = params.algorithm();
                    reporter.complete(TrainedModel {
                        key: model_key,
                        algorithm,
                        parameters: params.into_parameters(),
                        metrics,
                    });
                }
                TrainingScript::Fail {
                    steps,
                    step_delay,
                    error,
                } => {
                    if !run_steps(&reporter, steps, step_delay).await {
                        cancellations.fetch_add(1, Ordering::SeqCst);
                    }
                    reporter.fail(error);
                }
                TrainingScript::RunUntilCancelled => {
                    reporter.cancelled().await;
                    cancellations.fetch_add(1, Ordering::SeqCst);
                    reporter.fail(AlgorithmError::other("job cancelled"));
                }
                TrainingScript::DropWithoutResult | TrainingScript::RejectSubmission(_) => {
                    drop(reporter);
                }
            }
        });

        Ok(handle)
    }
}
