//! Benchmarks for metalearner parameter resolution using criterion.
//!
//! These benchmarks measure the performance of:
//! - Merging override documents into algorithm defaults
//! - Full parameter resolution (curation, merge, folds, family, validation)

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use metalearner::{
    EnsembleContext, LevelOneDatasets, MetalearnerAlgorithm, MetalearnerCrossValidation,
    MetalearnerOrchestrator, ModelParameters, OrchestratorConfig, OverrideDocument, ParentJob,
    TargetCategory, merge_overrides,
};
use metalearner_testkit::{InMemoryDatasetStore, ScriptedBuilder};

fn override_document(algorithm: MetalearnerAlgorithm) -> OverrideDocument {
    match algorithm {
        MetalearnerAlgorithm::Glm => OverrideDocument::new()
            .insert("alpha", ["0.0", "0.25", "0.5", "0.75", "1.0"])
            .insert("lambda", ["1e-4", "1e-3"])
            .insert("standardize", ["false"]),
        MetalearnerAlgorithm::Gbm => OverrideDocument::new()
            .insert("ntrees", ["200"])
            .insert("max_depth", ["7"])
            .insert("learn_rate", ["0.05"])
            .insert("sample_rate", ["0.8"]),
        MetalearnerAlgorithm::Drf => OverrideDocument::new()
            .insert("ntrees", ["100"])
            .insert("mtries", ["-2"]),
        MetalearnerAlgorithm::DeepLearning => OverrideDocument::new()
            .insert("hidden", ["64", "32", "16"])
            .insert("epochs", ["20"])
            .insert("activation", ["Tanh"]),
        MetalearnerAlgorithm::Auto => OverrideDocument::new(),
    }
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("override_merge");

    for algorithm in [
        MetalearnerAlgorithm::Glm,
        MetalearnerAlgorithm::Gbm,
        MetalearnerAlgorithm::Drf,
        MetalearnerAlgorithm::DeepLearning,
    ] {
        let defaults = ModelParameters::defaults_for(algorithm);
        let overrides = override_document(algorithm);
        group.bench_with_input(
            BenchmarkId::from_parameter(algorithm),
            &(defaults, overrides),
            |b, (defaults, overrides)| {
                b.iter(|| merge_overrides(black_box(defaults), black_box(overrides)))
            },
        );
    }

    group.finish();
}

fn bench_document_parse(c: &mut Criterion) {
    let text = r#"{"ntrees": ["200"], "max_depth": 7, "learn_rate": 0.05, "sample_rate": "0.8"}"#;
    c.bench_function("override_document_from_json", |b| {
        b.iter(|| OverrideDocument::from_json(black_box(text)))
    });
}

fn bench_resolve(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let _guard = rt.enter();

    let mut group = c.benchmark_group("resolve_parameters");
    let datasets = LevelOneDatasets::new("levelone_train").with_validation("levelone_valid");
    let ctx = EnsembleContext::new("response", TargetCategory::Binomial, ParentJob::new("bench"))
        .with_cross_validation(MetalearnerCrossValidation::folds(5));

    for algorithm in [MetalearnerAlgorithm::Auto, MetalearnerAlgorithm::Gbm] {
        let builder = Arc::new(ScriptedBuilder::succeeding(algorithm.builder_algorithm()));
        let orchestrator = MetalearnerOrchestrator::builder(OrchestratorConfig::default())
            .with_store(Arc::new(InMemoryDatasetStore::new()))
            .with_builder(builder.clone())
            .build()
            .expect("orchestrator builds");
        let overrides = override_document(algorithm);

        group.bench_function(BenchmarkId::from_parameter(algorithm), |b| {
            b.iter(|| {
                orchestrator.resolve_parameters(
                    algorithm,
                    builder.as_ref(),
                    black_box(&ctx),
                    black_box(&datasets),
                    Some(&overrides),
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_merge, bench_document_parse, bench_resolve);
criterion_main!(benches);
