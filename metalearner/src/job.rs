use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

use crate::algorithm::MetalearnerAlgorithm;
use crate::cancel::CancelToken;
use crate::model::TrainedModel;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Units of work completed by a job out of its estimated total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkEstimate {
    pub done: f64,
    pub total: f64,
}

impl WorkEstimate {
    pub fn new(done: f64, total: f64) -> Self {
        Self { done, total }
    }

    /// Completed fraction in `[0, 1]`; zero when the total is unknown.
    pub fn proportion(&self) -> f64 {
        if self.total > 0.0 && self.done.is_finite() {
            (self.done / self.total).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Latest progress reported to a parent job.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParentProgress {
    /// Progress proportion of the child currently running.
    pub work: f64,
    /// Human-readable status.
    pub message: String,
    /// Number of updates received so far.
    pub updates: u64,
}

/// Failure recorded on a parent job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentFailure {
    /// Short error category, e.g. `training_failure` or `cancelled`.
    pub status: String,
    pub message: String,
}

/// Handle to the ensemble-level job that owns a metalearner training.
///
/// Progress flows out through a watch channel; cancellation flows in through
/// the shared [`CancelToken`]. Clones share state.
#[derive(Clone, Debug)]
pub struct ParentJob {
    inner: Arc<ParentJobInner>,
}

#[derive(Debug)]
struct ParentJobInner {
    id: JobId,
    description: String,
    cancel: CancelToken,
    progress: watch::Sender<ParentProgress>,
    failure: Mutex<Option<ParentFailure>>,
}

impl ParentJob {
    pub fn new(description: impl Into<String>) -> Self {
        let (progress, _) = watch::channel(ParentProgress::default());
        Self {
            inner: Arc::new(ParentJobInner {
                id: JobId::new(),
                description: description.into(),
                cancel: CancelToken::new(),
                progress,
                failure: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.inner.id
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }

    /// Record the child's current progress and status message.
    pub fn update(&self, work: f64, message: impl Into<String>) {
        let message = message.into();
        self.inner.progress.send_modify(|progress| {
            progress.work = work;
            progress.message = message;
            progress.updates += 1;
        });
    }

    /// Snapshot of the latest progress.
    pub fn progress(&self) -> ParentProgress {
        self.inner.progress.borrow().clone()
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> watch::Receiver<ParentProgress> {
        self.inner.progress.subscribe()
    }

    /// Surface a failure on the parent job.
    pub fn fail(&self, status: impl Into<String>, message: impl Into<String>) {
        *self.inner.failure.lock() = Some(ParentFailure {
            status: status.into(),
            message: message.into(),
        });
    }

    pub fn failure(&self) -> Option<ParentFailure> {
        self.inner.failure.lock().clone()
    }

    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Wait until the parent job is cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancel.cancelled().await;
    }
}

/// Category of an algorithm-level training error.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AlgorithmErrorKind {
    UnsupportedConfiguration,
    Convergence,
    Other,
}

/// Error raised by the wrapped learning algorithm during training.
#[derive(Error, Clone, Debug, PartialEq)]
#[error("{message}")]
pub struct AlgorithmError {
    pub kind: AlgorithmErrorKind,
    pub message: String,
}

impl AlgorithmError {
    pub fn new(kind: AlgorithmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unsupported_configuration(message: impl Into<String>) -> Self {
        Self::new(AlgorithmErrorKind::UnsupportedConfiguration, message)
    }

    pub fn convergence(message: impl Into<String>) -> Self {
        Self::new(AlgorithmErrorKind::Convergence, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(AlgorithmErrorKind::Other, message)
    }
}

type JobOutcome = Result<TrainedModel, AlgorithmError>;

/// Observed state of a training job.
#[derive(Debug)]
pub enum JobStatus {
    Running(WorkEstimate),
    Finished(JobOutcome),
}

/// Caller side of an in-flight training job.
#[derive(Debug)]
pub struct TrainingJobHandle {
    id: JobId,
    algorithm: MetalearnerAlgorithm,
    work: watch::Receiver<WorkEstimate>,
    outcome: oneshot::Receiver<JobOutcome>,
    cancel: CancelToken,
}

impl TrainingJobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn algorithm(&self) -> MetalearnerAlgorithm {
        self.algorithm
    }

    /// Latest unit-of-work estimate published by the job.
    pub fn work(&self) -> WorkEstimate {
        *self.work.borrow()
    }

    /// Check the job without blocking.
    ///
    /// A job whose reporter is dropped without an outcome counts as failed.
    pub fn poll_status(&mut self) -> JobStatus {
        match self.outcome.try_recv() {
            Ok(outcome) => JobStatus::Finished(outcome),
            Err(oneshot::error::TryRecvError::Empty) => {
                JobStatus::Running(self.work())
            }
            Err(oneshot::error::TryRecvError::Closed) => {
                JobStatus::Finished(Err(AlgorithmError::other(
                    "training job ended without reporting a result",
                )))
            }
        }
    }

    /// Ask the running job to stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TrainingJobHandle {
    /// Nobody can collect the outcome once the handle is gone, so the job is
    /// told to stop. Harmless after the job has finished.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Job side of a training job, held by whatever executes the algorithm.
#[derive(Debug)]
pub struct TrainingJobReporter {
    id: JobId,
    work: watch::Sender<WorkEstimate>,
    outcome: oneshot::Sender<JobOutcome>,
    cancel: CancelToken,
}

impl TrainingJobReporter {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Publish the number of completed work units.
    pub fn report_work(&self, done: f64) {
        self.work.send_modify(|work| work.done = done);
    }

    pub fn complete(self, model: TrainedModel) {
        if self.outcome.send(Ok(model)).is_err() {
            tracing::debug!(job_id = %self.id, "training job finished after its handle was dropped");
        }
    }

    pub fn fail(self, error: AlgorithmError) {
        if self.outcome.send(Err(error)).is_err() {
            tracing::debug!(job_id = %self.id, "training job failed after its handle was dropped");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// Create the two ends of a training job with `total_work` estimated units.
pub fn training_job(
    algorithm: MetalearnerAlgorithm,
    total_work: f64,
) -> (TrainingJobReporter, TrainingJobHandle) {
    let id = JobId::new();
    let (work_tx, work_rx) = watch::channel(WorkEstimate::new(0.0, total_work));
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let cancel = CancelToken::new();

    let reporter = TrainingJobReporter {
        id,
        work: work_tx,
        outcome: outcome_tx,
        cancel: cancel.clone(),
    };
    let handle = TrainingJobHandle {
        id,
        algorithm,
        work: work_rx,
        outcome: outcome_rx,
        cancel,
    };
    (reporter, handle)
}
