use async_trait::async_trait;
use metalearner::{DatasetKey, DatasetStore};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Default)]
struct StoreState {
    datasets: BTreeSet<DatasetKey>,
    removals: Vec<DatasetKey>,
    failing: BTreeSet<DatasetKey>,
}

/// Dataset store kept in memory. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryDatasetStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryDatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_datasets<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<DatasetKey>,
    {
        let store = Self::new();
        for key in keys {
            store.insert(key);
        }
        store
    }

    pub fn insert(&self, key: impl Into<DatasetKey>) {
        self.state.lock().datasets.insert(key.into());
    }

    /// Make every removal of `key` fail.
    pub fn fail_removal_of(&self, key: impl Into<DatasetKey>) {
        self.state.lock().failing.insert(key.into());
    }

    pub fn holds(&self, key: &str) -> bool {
        self.state.lock().datasets.contains(&DatasetKey::new(key))
    }

    /// Successful removals, in order.
    pub fn removals(&self) -> Vec<DatasetKey> {
        self.state.lock().removals.clone()
    }

    pub fn removal_count(&self, key: &str) -> usize {
        self.state
            .lock()
            .removals
            .iter()
            .filter(|removed| removed.as_str() == key)
            .count()
    }

    pub fn assert_present(&self, key: &str) {
        assert!(self.holds(key), "expected dataset {key} to still be stored");
    }

    pub fn assert_absent(&self, key: &str) {
        assert!(!self.holds(key), "expected dataset {key} to be removed");
    }
}

#[async_trait]
impl DatasetStore for InMemoryDatasetStore {
    async fn remove(&self, key: &DatasetKey) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if state.failing.contains(key) {
            anyhow::bail!("store refused to remove {key}");
        }
        if !state.datasets.remove(key) {
            anyhow::bail!("dataset {key} is not in the store");
        }
        state.removals.push(key.clone());
        tracing::trace!(dataset = %key, "dataset removed from in-memory store");
        Ok(())
    }
}
