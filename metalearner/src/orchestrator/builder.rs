use std::fmt;
use std::sync::Arc;

use crate::builder::{AlgorithmBuilder, BuilderRegistry};
use crate::config::OrchestratorConfig;
use crate::events::TrainingEventBus;
use crate::store::DatasetStore;

use super::MetalearnerOrchestrator;

/// Builder for a [`MetalearnerOrchestrator`] with explicit collaborators.
///
/// # Example
///
/// ```ignore
/// let orchestrator = MetalearnerOrchestratorBuilder::new(config)
///     .with_store(store)
///     .with_builder(glm_builder)
///     .with_builder(gbm_builder)
///     .build()?;
/// ```
pub struct MetalearnerOrchestratorBuilder {
    config: OrchestratorConfig,
    builders: BuilderRegistry,
    store: Option<Arc<dyn DatasetStore>>,
    events: Option<TrainingEventBus>,
}

impl fmt::Debug for MetalearnerOrchestratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetalearnerOrchestratorBuilder")
            .field("config", &self.config)
            .field("builders", &self.builders)
            .field("store_set", &self.store.is_some())
            .field("events_set", &self.events.is_some())
            .finish()
    }
}

impl MetalearnerOrchestratorBuilder {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            builders: BuilderRegistry::new(),
            store: None,
            events: None,
        }
    }

    /// Set the shared dataset store.
    pub fn with_store(mut self, store: Arc<dyn DatasetStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register an algorithm builder.
    pub fn with_builder(mut self, builder: Arc<dyn AlgorithmBuilder>) -> Self {
        self.builders.register(builder);
        self
    }

    /// Replace the builder registry.
    pub fn with_builders(mut self, builders: BuilderRegistry) -> Self {
        self.builders = builders;
        self
    }

    /// Share an existing event bus instead of creating one from the config.
    pub fn with_events(mut self, events: TrainingEventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// # Errors
    ///
    /// Returns an error if the dataset store is missing.
    pub fn build(self) -> anyhow::Result<MetalearnerOrchestrator> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("dataset store dependency missing"))?;
        let events = self
            .events
            .unwrap_or_else(|| TrainingEventBus::new(self.config.event_capacity));
        Ok(MetalearnerOrchestrator::new(
            self.config,
            self.builders,
            store,
            events,
        ))
    }
}
