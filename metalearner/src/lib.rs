//! Metalearner - second-stage training for stacked ensembles.
//!
//! Once the base models of a stacked ensemble have produced their out-of-fold
//! predictions (the level-one dataset), this crate trains the metalearner on
//! them and writes it back into the ensemble model.
//!
//! # Core Concepts
//!
//! - **Orchestrator**: [`MetalearnerOrchestrator`] exposes one entry point per
//!   algorithm family plus [`MetalearnerOrchestrator::train_auto`]. All of
//!   them share one routine driven by an [`AlgorithmProfile`].
//!
//! - **Parameters**: every family has a parameter struct wrapped by
//!   [`ModelParameters`]. User overrides arrive as an [`OverrideDocument`] and
//!   are applied with [`merge_overrides`].
//!
//! - **Builders**: the [`AlgorithmBuilder`] trait supplies defaults,
//!   validates parameters and submits training jobs.
//!
//! - **Supervision**: [`JobSupervisor`] waits on a [`TrainingJobHandle`],
//!   relaying progress to the [`ParentJob`] and honouring its cancellation.
//!
//! - **Lifecycle**: [`ResourceLifecycle`] releases or retains the level-one
//!   datasets held in a [`DatasetStore`] and unlocks the
//!   [`LockedEnsembleModel`] exactly once.
//!
//! # Feature Flags
//!
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use metalearner::*;
//!
//! let orchestrator = MetalearnerOrchestrator::builder(OrchestratorConfig::default())
//!     .with_store(store)
//!     .with_builder(glm_builder)
//!     .build()?;
//!
//! let ctx = EnsembleContext::new("response", TargetCategory::Binomial, parent);
//! let datasets = LevelOneDatasets::new("levelone_train");
//! orchestrator.train_auto(&ctx, datasets, locked_model).await?;
//! ```

/// Metalearner algorithm families.
pub mod algorithm;

/// Algorithm builder seam and the registry of available builders.
pub mod builder;

/// Cancellation shared between parent and child jobs.
pub mod cancel;

/// Supervisor and orchestrator settings.
pub mod config;

/// Ensemble-side inputs: target category, dataset keys and the context
/// passed to every training.
pub mod ensemble;

/// Typed error taxonomy.
pub mod error;

/// Training lifecycle events.
///
/// The `events` module provides [`TrainingEvent`] with its [`EventMeta`]
/// envelope and the in-process [`TrainingEventBus`].
pub mod events;

/// Family/target selection for generalized linear metalearners.
pub mod family;

/// Cross-validation fold policy for the metalearner.
pub mod folds;

/// Training job handles, the reporter side used by schedulers, and the
/// parent job.
pub mod job;

/// Dataset disposal and ensemble write-back.
pub mod lifecycle;

#[cfg(feature = "metrics")]
/// Prometheus metrics, enabled by the `metrics` feature.
pub mod metrics;

/// Ensemble model record, its write-lock guard and trained models.
pub mod model;

/// Per-family entry points and the shared training routine.
pub mod orchestrator;

/// Hyperparameters and override merging.
pub mod params;

/// Shared dataset store seam.
pub mod store;

/// Submission and polling of training jobs.
pub mod supervisor;

/// Tracing spans and metric hooks.
pub mod telemetry;

pub use algorithm::*;
pub use builder::*;
pub use cancel::*;
pub use config::*;
pub use ensemble::*;
pub use error::{MetalearnerError, Result};
pub use events::*;
pub use family::*;
pub use folds::*;
pub use job::*;
pub use lifecycle::*;
pub use model::*;
pub use orchestrator::*;
pub use params::*;
pub use store::*;
pub use supervisor::*;
