use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the job supervisor's poll loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Interval between job status checks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Prefix of the status message reported to the parent job. The
    /// algorithm name is appended in parentheses.
    pub progress_message_prefix: String,
}

impl SupervisorConfig {
    /// Set the polling interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the progress message prefix.
    pub fn with_progress_message_prefix(
        mut self,
        prefix: impl Into<String>,
    ) -> Self {
        self.progress_message_prefix = prefix.into();
        self
    }

    /// Polling interval as a [`Duration`], never shorter than one millisecond.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            progress_message_prefix: "training metalearner".to_string(),
        }
    }
}

/// Configuration for the metalearner orchestrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Supervisor settings.
    pub supervisor: SupervisorConfig,
    /// Buffer size of the training event bus.
    pub event_capacity: usize,
}

impl OrchestratorConfig {
    /// Set the supervisor configuration.
    pub fn with_supervisor(mut self, supervisor: SupervisorConfig) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Set the event bus capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            supervisor: SupervisorConfig::default(),
            event_capacity: 256,
        }
    }
}
