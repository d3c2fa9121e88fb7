//! In-memory collaborators for exercising the metalearner orchestrator.
//!
//! - [`InMemoryDatasetStore`] - dataset store that rejects double removal
//! - [`RecordingEnsembleModel`] - ensemble model record logging every call
//! - [`ScriptedBuilder`] - algorithm builder whose jobs follow a script

mod builder;
mod model;
mod store;

pub use builder::{ScriptedBuilder, Submission, TrainingScript};
pub use model::{ModelCall, RecordingEnsembleModel};
pub use store::InMemoryDatasetStore;
