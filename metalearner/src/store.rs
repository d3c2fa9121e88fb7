use async_trait::async_trait;

use crate::ensemble::DatasetKey;

/// Shared key-value store holding level-one datasets.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Remove a dataset. Removing a key twice is an error.
    async fn remove(&self, key: &DatasetKey) -> anyhow::Result<()>;
}
