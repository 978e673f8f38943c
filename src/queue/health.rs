//! Queue health evaluation

use crate::queue::stats::QueueStatistics;
use serde::Serialize;
use std::time::Duration;
use strum_macros::Display;

/// Failure rate above which a queue is reported as Warning
pub const FAILURE_RATE_WARNING: f64 = 0.10;
/// Failure rate above which a queue is reported as Critical
pub const FAILURE_RATE_CRITICAL: f64 = 0.50;

/// Coarse operational risk, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    /// Reserved for a queue that does not exist
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub queue_name: String,
    pub status: HealthStatus,
    pub issues: Vec<String>,
    pub statistics: Option<QueueStatistics>,
}

impl QueueHealth {
    pub fn missing(queue_name: &str) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            status: HealthStatus::Unhealthy,
            issues: vec![format!("Queue '{}' does not exist", queue_name)],
            statistics: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Derive health from a statistics snapshot
    ///
    /// The most severe finding wins. A queue holding `capacity` messages is
    /// always Critical.
    pub fn evaluate(
        statistics: QueueStatistics,
        processing_active: bool,
        slow_processing_threshold: Duration,
    ) -> Self {
        let mut status = HealthStatus::Healthy;
        let mut issues = Vec::new();
        let mut raise = |level: HealthStatus, issue: String| {
            status = status.max(level);
            issues.push(issue);
        };

        if statistics.queued_count > 0 && !processing_active {
            raise(
                HealthStatus::Warning,
                format!(
                    "{} messages queued but no processor is running",
                    statistics.queued_count
                ),
            );
        }

        if statistics.queued_count >= statistics.capacity {
            raise(
                HealthStatus::Critical,
                format!("Queue is at capacity ({})", statistics.capacity),
            );
        }

        if statistics.failure_rate > FAILURE_RATE_CRITICAL {
            raise(
                HealthStatus::Critical,
                format!("Failure rate {:.1}%", statistics.failure_rate * 100.0),
            );
        } else if statistics.failure_rate > FAILURE_RATE_WARNING {
            raise(
                HealthStatus::Warning,
                format!("Failure rate {:.1}%", statistics.failure_rate * 100.0),
            );
        }

        if statistics.average_processing_time > slow_processing_threshold {
            raise(
                HealthStatus::Warning,
                format!(
                    "Average processing time {:?} exceeds {:?}",
                    statistics.average_processing_time, slow_processing_threshold
                ),
            );
        }

        Self {
            queue_name: statistics.queue_name.clone(),
            status,
            issues,
            statistics: Some(statistics),
        }
    }
}
