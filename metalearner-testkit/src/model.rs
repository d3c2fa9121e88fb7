use async_trait::async_trait;
use metalearner::{
    DatasetKey, EnsembleModelRecord, LockedEnsembleModel, ModelKey, ModelMetrics, TrainedModel,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// One call made against a [`RecordingEnsembleModel`].
#[derive(Clone, Debug, PartialEq)]
pub enum ModelCall {
    AttachMetalearner(ModelKey),
    AttachRetainedDataset(DatasetKey),
    PersistAndUnlock,
    Unlock,
}

#[derive(Default)]
struct RecordState {
    calls: Vec<ModelCall>,
    metalearner: Option<TrainedModel>,
    metrics: Option<ModelMetrics>,
    retained: Option<DatasetKey>,
    persisted: bool,
    unlocks: usize,
    fail_persist: bool,
}

/// Ensemble model record that logs what the orchestrator does to it.
///
/// Clones share state, so keep one to inspect after handing a
/// [`LockedEnsembleModel`] from [`RecordingEnsembleModel::lock`] to the code
/// under test.
#[derive(Clone)]
pub struct RecordingEnsembleModel {
    key: ModelKey,
    state: Arc<Mutex<RecordState>>,
}

impl RecordingEnsembleModel {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: ModelKey::new(key),
            state: Arc::new(Mutex::new(RecordState::default())),
        }
    }

    /// Make `persist_and_unlock` fail.
    pub fn fail_persist(self) -> Self {
        self.state.lock().fail_persist = true;
        self
    }

    /// Write-locked handle sharing this record's state.
    pub fn lock(&self) -> LockedEnsembleModel {
        LockedEnsembleModel::new(Box::new(self.clone()))
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.state.lock().calls.clone()
    }

    pub fn metalearner(&self) -> Option<TrainedModel> {
        self.state.lock().metalearner.clone()
    }

    pub fn metrics(&self) -> Option<ModelMetrics> {
        self.state.lock().metrics.clone()
    }

    pub fn retained_dataset(&self) -> Option<DatasetKey> {
        self.state.lock().retained.clone()
    }

    pub fn persisted(&self) -> bool {
        self.state.lock().persisted
    }

    pub fn unlock_count(&self) -> usize {
        self.state.lock().unlocks
    }

    pub fn assert_unlocked_once(&self) {
        let unlocks = self.unlock_count();
        assert_eq!(unlocks, 1, "expected exactly one unlock, got {unlocks}");
    }
}

#[async_trait]
impl EnsembleModelRecord for RecordingEnsembleModel {
    fn key(&self) -> &ModelKey {
        &self.key
    }

    async fn attach_metalearner(
        &mut self,
        model: &TrainedModel,
        metrics: &ModelMetrics,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ModelCall::AttachMetalearner(model.key.clone()));
        state.metalearner = Some(model.clone());
        state.metrics = Some(metrics.clone());
        Ok(())
    }

    async fn attach_retained_dataset(&mut self, key: &DatasetKey) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ModelCall::AttachRetainedDataset(key.clone()));
        state.retained = Some(key.clone());
        Ok(())
    }

    async fn persist_and_unlock(&mut self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ModelCall::PersistAndUnlock);
        if state.fail_persist {
            anyhow::bail!("model store rejected {}", self.key);
        }
        state.persisted = true;
        state.unlocks += 1;
        Ok(())
    }

    async fn unlock(&mut self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ModelCall::Unlock);
        state.unlocks += 1;
        Ok(())
    }
}
