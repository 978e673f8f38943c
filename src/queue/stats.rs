//! Live queue statistics
//!
//! Cumulative counters are atomics so producers never contend on a lock.
//! The rolling windows (processing times and recent outcomes) sit behind a
//! short-held mutex touched only when a message completes or fails.

use crate::core::sync::recover_poisoned;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Number of recent completions averaged for processing time, and of recent
/// outcomes used for the failure rate
pub const ROLLING_WINDOW: usize = 100;

/// Read-only snapshot of a queue's state and history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatistics {
    pub queue_name: String,
    pub queued_count: usize,
    pub in_flight_count: usize,
    pub dead_letter_count: usize,
    /// Admissions, including retry and redrive re-admissions
    pub total_enqueued: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_dead_lettered: u64,
    pub total_rejected: u64,
    pub peak_queue_size: usize,
    pub capacity: usize,
    #[serde(rename = "average_processing_time_ms", with = "crate::queue::config::duration_ms")]
    pub average_processing_time: Duration,
    /// Fraction of failures among the last [`ROLLING_WINDOW`] outcomes
    pub failure_rate: f64,
    /// Completed messages per second since the queue was created
    pub throughput: f64,
    pub last_updated: DateTime<Utc>,
}

impl QueueStatistics {
    /// Fraction of capacity currently holding messages
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.queued_count as f64 / self.capacity as f64
    }
}

#[derive(Debug, Default)]
struct RollingWindows {
    processing_times: VecDeque<Duration>,
    /// `true` marks a failure
    outcomes: VecDeque<bool>,
}

impl RollingWindows {
    fn push_outcome(&mut self, failed: bool) {
        if self.outcomes.len() == ROLLING_WINDOW {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(failed);
    }

    fn push_processing_time(&mut self, elapsed: Duration) {
        if self.processing_times.len() == ROLLING_WINDOW {
            self.processing_times.pop_front();
        }
        self.processing_times.push_back(elapsed);
    }

    fn average_processing_time(&self) -> Duration {
        if self.processing_times.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.processing_times.iter().sum();
        total / self.processing_times.len() as u32
    }

    fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|failed| **failed).count();
        failures as f64 / self.outcomes.len() as f64
    }
}

/// Counters owned by a queue and updated as messages move through it
#[derive(Debug)]
pub(crate) struct StatsRecorder {
    created: Instant,
    total_enqueued: AtomicU64,
    total_completed: AtomicU64,
    total_failed: AtomicU64,
    total_dead_lettered: AtomicU64,
    total_rejected: AtomicU64,
    peak_queue_size: AtomicUsize,
    windows: Mutex<RollingWindows>,
}

impl StatsRecorder {
    pub(crate) fn new() -> Self {
        Self {
            created: Instant::now(),
            total_enqueued: AtomicU64::new(0),
            total_completed: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            total_dead_lettered: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
            peak_queue_size: AtomicUsize::new(0),
            windows: Mutex::new(RollingWindows::default()),
        }
    }

    pub(crate) fn record_enqueued(&self, queue_len: usize) {
        self.total_enqueued.fetch_add(1, Ordering::Relaxed);
        self.peak_queue_size.fetch_max(queue_len, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.total_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self, elapsed: Duration) {
        self.total_completed.fetch_add(1, Ordering::Relaxed);
        let mut windows = recover_poisoned(self.windows.lock(), "queue statistics");
        windows.push_processing_time(elapsed);
        windows.push_outcome(false);
    }

    pub(crate) fn record_failed(&self) {
        self.total_failed.fetch_add(1, Ordering::Relaxed);
        recover_poisoned(self.windows.lock(), "queue statistics").push_outcome(true);
    }

    pub(crate) fn record_dead_lettered(&self) {
        self.total_dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        queue_name: &str,
        queued_count: usize,
        in_flight_count: usize,
        dead_letter_count: usize,
        capacity: usize,
    ) -> QueueStatistics {
        let (average_processing_time, failure_rate) = {
            let windows = recover_poisoned(self.windows.lock(), "queue statistics");
            (windows.average_processing_time(), windows.failure_rate())
        };
        let total_completed = self.total_completed.load(Ordering::Relaxed);
        let uptime = self.created.elapsed().as_secs_f64();
        let throughput = if uptime > 0.0 {
            total_completed as f64 / uptime
        } else {
            0.0
        };

        QueueStatistics {
            queue_name: queue_name.to_string(),
            queued_count,
            in_flight_count,
            dead_letter_count,
            total_enqueued: self.total_enqueued.load(Ordering::Relaxed),
            total_completed,
            total_failed: self.total_failed.load(Ordering::Relaxed),
            total_dead_lettered: self.total_dead_lettered.load(Ordering::Relaxed),
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
            peak_queue_size: self.peak_queue_size.load(Ordering::Relaxed),
            capacity,
            average_processing_time,
            failure_rate,
            throughput,
            last_updated: Utc::now(),
        }
    }
}
