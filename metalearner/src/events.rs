use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::algorithm::MetalearnerAlgorithm;
use crate::ensemble::DatasetKey;
use crate::job::{JobId, WorkEstimate};
use crate::model::ModelKey;

/// Metadata envelope attached to every training event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMeta {
    pub version: u16,
    /// Shared by every event of one metalearner training.
    pub correlation_id: Uuid,
    /// Ensemble model the training belongs to.
    pub ensemble: ModelKey,
    pub timestamp: DateTime<Utc>,
}

impl EventMeta {
    pub fn new(ensemble: ModelKey, correlation_id: Option<Uuid>) -> Self {
        Self {
            version: 1,
            correlation_id: correlation_id.unwrap_or_else(Uuid::now_v7),
            ensemble,
            timestamp: Utc::now(),
        }
    }
}

/// Training event with metadata and payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingEvent {
    pub meta: EventMeta,
    pub payload: TrainingEventPayload,
}

/// Lifecycle transitions of a metalearner training.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TrainingEventPayload {
    /// Training job was accepted by the builder.
    Submitted {
        job_id: JobId,
        algorithm: MetalearnerAlgorithm,
        model: ModelKey,
    },
    /// Supervisor observed the job's progress.
    Progress {
        job_id: JobId,
        work: WorkEstimate,
    },
    /// Metalearner trained and attached to the ensemble.
    Completed {
        algorithm: MetalearnerAlgorithm,
        model: ModelKey,
    },
    /// Training ended with an error.
    Failed {
        algorithm: MetalearnerAlgorithm,
        status: String,
        message: String,
    },
    /// Parent job cancelled the training.
    Cancelled {
        job_id: JobId,
        algorithm: MetalearnerAlgorithm,
    },
    /// A level-one dataset was removed from the store.
    DatasetReleased { key: DatasetKey },
    /// The level-one training dataset was kept with the ensemble.
    DatasetRetained { key: DatasetKey },
    /// The ensemble write lock was released.
    ModelUnlocked { model: ModelKey, persisted: bool },
}

/// In-process fan-out bus for training events.
///
/// Publishing never blocks; lagging subscribers receive
/// `RecvError::Lagged` and events are dropped when nobody listens.
#[derive(Clone)]
pub struct TrainingEventBus {
    sender: broadcast::Sender<TrainingEvent>,
    capacity: usize,
}

impl std::fmt::Debug for TrainingEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl TrainingEventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn publish(&self, event: TrainingEvent) {
        let _ = self.sender.send(event);
    }

    /// Wrap `payload` in `meta` and publish it.
    pub fn emit(&self, meta: &EventMeta, payload: TrainingEventPayload) {
        let mut meta = meta.clone();
        meta.timestamp = Utc::now();
        self.publish(TrainingEvent { meta, payload });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrainingEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let bus = TrainingEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let meta = EventMeta::new(ModelKey::new("se_1"), None);
        bus.emit(
            &meta,
            TrainingEventPayload::DatasetReleased {
                key: DatasetKey::new("levelone_valid"),
            },
        );

        for rx in [&mut rx1, &mut rx2] {
            let event = timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("event delivered")
                .expect("channel open");
            assert_eq!(event.meta.correlation_id, meta.correlation_id);
            assert_eq!(
                event.payload,
                TrainingEventPayload::DatasetReleased {
                    key: DatasetKey::new("levelone_valid")
                }
            );
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = TrainingEventBus::new(0);
        assert_eq!(bus.capacity(), 1);
        bus.emit(
            &EventMeta::new(ModelKey::new("se_1"), None),
            TrainingEventPayload::ModelUnlocked {
                model: ModelKey::new("se_1"),
                persisted: false,
            },
        );
    }

    #[tokio::test]
    async fn test_lagging_subscriber_sees_lagged() {
        let bus = TrainingEventBus::new(2);
        let mut rx = bus.subscribe();
        let meta = EventMeta::new(ModelKey::new("se_1"), None);
        for i in 0..4 {
            bus.emit(
                &meta,
                TrainingEventPayload::DatasetRetained {
                    key: DatasetKey::new(format!("frame_{i}")),
                },
            );
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
