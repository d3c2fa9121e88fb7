//! Tracing spans and metric hooks for metalearner training.
//!
//! Every helper logs through `tracing` and, with the `metrics` feature
//! enabled, also updates the Prometheus collectors in [`crate::metrics`].
//! Without the feature the metric side compiles away.
//!
//! # Example
//!
//! ```ignore
//! use metalearner::telemetry::{record_training_start, record_training_end, train_span};
//!
//! let span = train_span("se_1", "gbm");
//! let timing = record_training_start("gbm");
//! // ... training
//! record_training_end(timing, "success");
//! ```

use tracing::{Span, info_span};

/// Span wrapping a complete metalearner training.
#[must_use]
pub fn train_span(ensemble: impl AsRef<str>, algorithm: impl AsRef<str>) -> Span {
    info_span!(
        "metalearner.train",
        ensemble = %ensemble.as_ref(),
        algorithm = %algorithm.as_ref(),
    )
}

/// Span wrapping the supervision of one training job.
#[must_use]
pub fn supervise_span(job_id: impl AsRef<str>, algorithm: impl AsRef<str>) -> Span {
    info_span!(
        "metalearner.supervise",
        job_id = %job_id.as_ref(),
        algorithm = %algorithm.as_ref(),
    )
}

/// Span wrapping dataset disposal and the ensemble write-back.
#[must_use]
pub fn finalize_span(ensemble: impl AsRef<str>, keep_levelone_frame: bool) -> Span {
    info_span!(
        "metalearner.finalize",
        ensemble = %ensemble.as_ref(),
        keep_levelone_frame = keep_levelone_frame,
    )
}

/// Record the outcome of a training.
///
/// `status` is `success` or the error's status label.
pub fn record_training_outcome(algorithm: impl AsRef<str>, status: impl AsRef<str>) {
    if status.as_ref() == "success" {
        tracing::info!(
            algorithm = %algorithm.as_ref(),
            status = %status.as_ref(),
            "metalearner training finished"
        );
    } else {
        tracing::warn!(
            algorithm = %algorithm.as_ref(),
            status = %status.as_ref(),
            "metalearner training did not complete"
        );
    }

    #[cfg(feature = "metrics")]
    crate::metrics::record_training(algorithm.as_ref(), status.as_ref());
}

/// Record the removal of a level-one dataset. `role` is `training` or
/// `validation`.
pub fn record_dataset_released(key: impl AsRef<str>, role: &'static str) {
    tracing::debug!(dataset = %key.as_ref(), role, "level-one dataset removed");

    #[cfg(feature = "metrics")]
    crate::metrics::record_dataset_released(role);
}

/// Update the progress gauge of a running training.
pub fn set_training_progress(algorithm: impl AsRef<str>, proportion: f64) {
    tracing::trace!(
        algorithm = %algorithm.as_ref(),
        proportion,
        "metalearner progress"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::set_progress(algorithm.as_ref(), proportion);
}

/// Start timing a training. Pass the handle to [`record_training_end`].
pub fn record_training_start(algorithm: impl AsRef<str>) -> TrainingTimingHandle {
    TrainingTimingHandle {
        algorithm: algorithm.as_ref().to_string(),
        start: std::time::Instant::now(),
    }
}

/// Stop timing a training and record its outcome and duration.
pub fn record_training_end(handle: TrainingTimingHandle, status: impl AsRef<str>) {
    let duration_secs = handle.start.elapsed().as_secs_f64();
    tracing::info!(
        algorithm = %handle.algorithm,
        status = %status.as_ref(),
        duration_secs,
        "metalearner training duration observed"
    );
    record_training_outcome(&handle.algorithm, status.as_ref());

    #[cfg(feature = "metrics")]
    crate::metrics::observe_training_duration(&handle.algorithm, status.as_ref(), duration_secs);
}

/// Opaque timing handle returned by [`record_training_start`].
#[derive(Debug)]
pub struct TrainingTimingHandle {
    algorithm: String,
    start: std::time::Instant,
}

impl TrainingTimingHandle {
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_names() {
        // Spans are disabled without a subscriber, so install one.
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        tracing::subscriber::with_default(subscriber, || {
            assert_eq!(
                train_span("se_1", "glm").metadata().unwrap().name(),
                "metalearner.train"
            );
            assert_eq!(
                supervise_span("job", "glm").metadata().unwrap().name(),
                "metalearner.supervise"
            );
            assert_eq!(
                finalize_span("se_1", true).metadata().unwrap().name(),
                "metalearner.finalize"
            );
        });
    }

    #[test]
    fn test_timing_handle() {
        let handle = record_training_start("drf");
        assert_eq!(handle.algorithm(), "drf");
        std::thread::sleep(std::time::Duration::from_millis(1));
        assert!(handle.elapsed().as_nanos() > 0);
        record_training_end(handle, "success");
    }

    #[test]
    fn test_dataset_and_progress_hooks() {
        record_dataset_released("levelone_train", "training");
        set_training_progress("gbm", 0.4);
        record_training_outcome("gbm", "cancelled");
    }
}
