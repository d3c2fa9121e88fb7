//! Prometheus metrics for metalearner training.
//!
//! Compiled only with the `metrics` feature.
//!
//! # Metrics
//!
//! ## Counters
//! - `metalearner_trainings_total` - Trainings finished, by algorithm and status
//! - `metalearner_datasets_released_total` - Level-one datasets removed, by role
//!
//! ## Gauges
//! - `metalearner_progress` - Latest progress proportion of a running training
//!
//! ## Histograms
//! - `metalearner_training_duration_seconds` - Wall time of a training
#![cfg(feature = "metrics")]

use prometheus::{CounterVec, GaugeVec, HistogramVec, Opts, Registry, exponential_buckets};
use std::sync::LazyLock;

/// Global registry for metalearner metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Labels: `algorithm`, `status`.
pub static TRAININGS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "metalearner_trainings_total",
        "Total number of metalearner trainings finished",
    );
    CounterVec::new(opts, &["algorithm", "status"])
        .expect("metalearner_trainings_total metric creation failed")
});

/// Labels: `role` (`training` or `validation`).
pub static DATASETS_RELEASED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "metalearner_datasets_released_total",
        "Total number of level-one datasets removed from the store",
    );
    CounterVec::new(opts, &["role"])
        .expect("metalearner_datasets_released_total metric creation failed")
});

/// Labels: `algorithm`.
pub static PROGRESS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "metalearner_progress",
        "Progress proportion (0-1) of the running metalearner training",
    );
    GaugeVec::new(opts, &["algorithm"]).expect("metalearner_progress metric creation failed")
});

/// Labels: `algorithm`, `status`.
pub static TRAINING_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.01, 2.0, 16).expect("bucket creation failed");
    let opts = prometheus::HistogramOpts::new(
        "metalearner_training_duration_seconds",
        "Metalearner training duration in seconds",
    )
    .buckets(buckets);
    HistogramVec::new(opts, &["algorithm", "status"])
        .expect("metalearner_training_duration_seconds metric creation failed")
});

/// Register every collector with [`REGISTRY`]. Safe to call repeatedly.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    for metric in [
        Box::new(TRAININGS_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(DATASETS_RELEASED_TOTAL.clone()),
        Box::new(PROGRESS.clone()),
        Box::new(TRAINING_DURATION_SECONDS.clone()),
    ] {
        if let Err(e) = registry.register(metric) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

pub fn record_training(algorithm: &str, status: &str) {
    TRAININGS_TOTAL.with_label_values(&[algorithm, status]).inc();
}

pub fn record_dataset_released(role: &str) {
    DATASETS_RELEASED_TOTAL.with_label_values(&[role]).inc();
}

pub fn set_progress(algorithm: &str, proportion: f64) {
    PROGRESS.with_label_values(&[algorithm]).set(proportion);
}

pub fn observe_training_duration(algorithm: &str, status: &str, duration_secs: f64) {
    TRAINING_DURATION_SECONDS
        .with_label_values(&[algorithm, status])
        .observe(duration_secs);
}

/// Gather all registered metrics in Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_metrics().expect("first registration");
        init_metrics().expect("second registration");
    }

    #[test]
    fn test_gather_includes_recorded_series() {
        init_metrics().expect("metrics initialization should succeed");

        record_training("gbm", "success");
        record_dataset_released("validation");
        set_progress("gbm", 0.5);
        observe_training_duration("gbm", "success", 1.5);

        let output = gather_metrics().expect("gather should succeed");
        assert!(output.contains("metalearner_trainings_total"));
        assert!(output.contains("metalearner_datasets_released_total"));
        assert!(output.contains("metalearner_training_duration_seconds"));
    }
}
