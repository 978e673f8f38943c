//! Queue and manager configuration
//!
//! Both structures implement `Default` and serde `Deserialize` so they can be
//! read from the `[queue]` and `[manager]` tables of a TOML file. Durations
//! are written in milliseconds in files (`*_ms` keys).

use crate::core::retry::BackoffPolicy;
use crate::queue::error::{QueueError, QueueResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable per-queue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub name: String,
    pub max_capacity: usize,
    pub batch_size: usize,
    #[serde(rename = "batch_timeout_ms", with = "duration_ms")]
    pub batch_timeout: Duration,
    pub max_retries: u32,
    #[serde(rename = "retry_base_interval_ms", with = "duration_ms")]
    pub retry_base_interval: Duration,
    #[serde(rename = "retry_max_interval_ms", with = "option_duration_ms")]
    pub retry_max_interval: Option<Duration>,
    pub priority_enabled: bool,
    pub worker_count: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_capacity: 10_000,
            batch_size: 50,
            batch_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_base_interval: Duration::from_secs(1),
            retry_max_interval: None,
            priority_enabled: false,
            worker_count: 1,
        }
    }
}

impl QueueConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> QueueResult<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("queue name must not be empty"));
        }
        if self.max_capacity == 0 {
            return Err(invalid("max_capacity must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be greater than 0"));
        }
        if self.worker_count == 0 {
            return Err(invalid("worker_count must be greater than 0"));
        }
        if let Some(max) = self.retry_max_interval {
            if max < self.retry_base_interval {
                return Err(invalid(
                    "retry_max_interval must not be shorter than retry_base_interval",
                ));
            }
        }
        Ok(())
    }

    /// Backoff policy derived from the retry settings
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            base_interval: self.retry_base_interval,
            max_interval: self.retry_max_interval,
        }
    }
}

fn invalid(message: &str) -> QueueError {
    QueueError::InvalidConfig {
        message: message.to_string(),
    }
}

/// Settings for the processing loops and health evaluation of a [`QueueManager`]
///
/// [`QueueManager`]: crate::queue::QueueManager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Wait between polls when a queue is empty or paused
    #[serde(rename = "idle_wait_ms", with = "duration_ms")]
    pub idle_wait: Duration,
    /// Pause after a processor panic before the loop continues
    #[serde(rename = "error_pause_ms", with = "duration_ms")]
    pub error_pause: Duration,
    /// Bound on waiting for a loop to exit when stopping
    #[serde(rename = "stop_timeout_ms", with = "duration_ms")]
    pub stop_timeout: Duration,
    /// Average processing time above which health reports a warning
    #[serde(rename = "slow_processing_threshold_ms", with = "duration_ms")]
    pub slow_processing_threshold: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            idle_wait: Duration::from_millis(100),
            error_pause: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(5),
            slow_processing_threshold: Duration::from_secs(5),
        }
    }
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

pub(crate) mod option_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
