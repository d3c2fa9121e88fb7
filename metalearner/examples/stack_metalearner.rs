//! Train metalearners for a stacked ensemble with in-memory collaborators.
//!
//! This example demonstrates:
//! - A custom algorithm builder running jobs on tokio tasks
//! - Override documents for a gradient-boosted metalearner
//! - The curated default metalearner
//! - Watching parent progress and the training event stream
//!
//! Run with `RUST_LOG=metalearner=debug` to see the supervisor's poll ticks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metalearner::*;
use metalearner_testkit::{InMemoryDatasetStore, RecordingEnsembleModel};

/// Builder that pretends to fit a model in a fixed number of epochs.
struct EpochBuilder {
    algorithm: MetalearnerAlgorithm,
    epochs: u32,
}

#[async_trait]
impl AlgorithmBuilder for EpochBuilder {
    fn algorithm(&self) -> MetalearnerAlgorithm {
        self.algorithm
    }

    async fn train_async(
        &self,
        model_key: ModelKey,
        params: ResolvedParameters,
    ) -> anyhow::Result<TrainingJobHandle> {
        let epochs = self.epochs;
        let (reporter, handle) = training_job(params.algorithm(), f64::from(epochs));

        tokio::spawn(async move {
            let mut loss = 1.0;
            for epoch in 1..=epochs {
                if reporter.is_cancelled() {
                    reporter.fail(AlgorithmError::other("stopped by caller"));
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
                loss *= 0.8;
                reporter.report_work(f64::from(epoch));
            }

            let metrics = ModelMetrics {
                training: [("rmse".to_string(), loss)].into_iter().collect(),
                validation: params
                    .parameters()
                    .common()
                    .valid
                    .as_ref()
                    .map(|_| [("rmse".to_string(), loss * 1.1)].into_iter().collect()),
                cross_validation: None,
            };
            let algorithm = params.algorithm();
            reporter.complete(TrainedModel {
                key: model_key,
                algorithm,
                parameters: params.into_parameters(),
                metrics,
            });
        });

        Ok(handle)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "metalearner=info".into()),
        )
        .init();

    println!("=== Stacked Ensemble Metalearner Example ===\n");

    let store = InMemoryDatasetStore::with_datasets([
        "levelone_train_1",
        "levelone_valid_1",
        "levelone_train_2",
    ]);

    let orchestrator = MetalearnerOrchestrator::builder(
        OrchestratorConfig::default()
            .with_supervisor(SupervisorConfig::default().with_poll_interval(25)),
    )
    .with_store(Arc::new(store.clone()))
    .with_builder(Arc::new(EpochBuilder {
        algorithm: MetalearnerAlgorithm::Glm,
        epochs: 5,
    }))
    .with_builder(Arc::new(EpochBuilder {
        algorithm: MetalearnerAlgorithm::Gbm,
        epochs: 8,
    }))
    .build()?;

    let mut events = orchestrator.events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.payload {
                TrainingEventPayload::Progress { .. } => {}
                payload => println!("   [event] {}: {:?}", event.meta.ensemble, payload),
            }
        }
    });

    // 1. Gradient-boosted metalearner with overrides, keeping the level-one frame.
    println!("1. Training a gbm metalearner with overrides...");
    let parent = ParentJob::new("stackedensemble_1");
    let mut progress = parent.subscribe();
    let watcher = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow_and_update().clone();
            println!("   [{:>5.1}%] {}", snapshot.work * 100.0, snapshot.message);
        }
    });

    let ctx = EnsembleContext::new("response", TargetCategory::Binomial, parent)
        .with_cross_validation(MetalearnerCrossValidation::folds(5))
        .with_keep_levelone_frame(true);
    let overrides = OverrideDocument::from_json(r#"{"ntrees": ["200"], "learn_rate": 0.05}"#)?;
    let ensemble = RecordingEnsembleModel::new("stackedensemble_1");

    let report = orchestrator
        .train_gradient_boosted(
            &ctx,
            LevelOneDatasets::new("levelone_train_1").with_validation("levelone_valid_1"),
            ensemble.lock(),
            Some(&overrides),
        )
        .await?;
    drop(ctx);
    watcher.await?;

    println!("   retained: {:?}", report.retained);
    println!("   released: {:?}", report.released);
    if let Some(metalearner) = ensemble.metalearner() {
        println!("   metalearner {} metrics: {:?}", metalearner.key, metalearner.metrics);
    }

    // 2. Curated default metalearner for a regression ensemble.
    println!("\n2. Training the default metalearner...");
    let ctx = EnsembleContext::new(
        "response",
        TargetCategory::Regression,
        ParentJob::new("stackedensemble_2"),
    );
    let ensemble = RecordingEnsembleModel::new("stackedensemble_2");
    orchestrator
        .train_auto(&ctx, LevelOneDatasets::new("levelone_train_2"), ensemble.lock())
        .await?;

    if let Some(metalearner) = ensemble.metalearner() {
        if let ModelParameters::Glm(glm) = &metalearner.parameters {
            println!(
                "   family={} non_negative={} lambda_search={}",
                glm.family, glm.non_negative, glm.lambda_search
            );
        }
    }

    println!("\n3. Datasets left in the store:");
    for key in ["levelone_train_1", "levelone_valid_1", "levelone_train_2"] {
        println!("   {key}: {}", if store.holds(key) { "present" } else { "removed" });
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
