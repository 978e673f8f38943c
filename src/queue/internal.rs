//! Bounded concurrent queue with retry and dead-letter handling
//!
//! The holding area and the in-flight table share one lock so that capacity
//! accounting and in-flight counts always agree. Messages are keyed by
//! `(priority, sequence)` in a `BTreeMap`: with priority disabled every key
//! has the same priority and the queue degrades to strict FIFO, with priority
//! enabled higher priorities come first and insertion order breaks ties.
//!
//! Capacity counts only the holding area. A message stops occupying capacity
//! once dequeued and must pass the capacity check again when requeued.

use crate::core::sync::recover_poisoned;
use crate::notifications::api::{Event, NotificationManager, QueueEvent, QueueEventType};
use crate::queue::config::QueueConfig;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::message::{MessageId, MessageStatus, QueuedMessage, LAST_ERROR_KEY};
use crate::queue::stats::{QueueStatistics, StatsRecorder};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

type OrderKey = (Reverse<i32>, u64);

struct QueueState<T> {
    pending: BTreeMap<OrderKey, QueuedMessage<T>>,
    next_sequence: u64,
    /// Dequeued message ids and when they were handed out
    in_flight: HashMap<MessageId, Instant>,
}

impl<T> QueueState<T> {
    fn admit(&mut self, message: QueuedMessage<T>, priority_enabled: bool) -> usize {
        let priority = if priority_enabled { message.priority } else { 0 };
        let key = (Reverse(priority), self.next_sequence);
        self.next_sequence += 1;
        self.pending.insert(key, message);
        self.pending.len()
    }
}

/// Result of handing a failed message back to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueOutcome {
    /// Re-admitted after waiting `delay`; `attempt` is the new retry count
    Requeued { attempt: u32, delay: Duration },
    /// Retry budget exhausted
    DeadLettered,
    /// Backoff elapsed but the queue was full, so the message was dead-lettered
    RejectedAtCapacity,
}

impl RequeueOutcome {
    pub fn is_dead_lettered(&self) -> bool {
        !matches!(self, RequeueOutcome::Requeued { .. })
    }
}

/// Counts a message as retrying until dropped
///
/// Taken before the message leaves the in-flight table so the queue never
/// looks idle while a retry is pending. Dropping it (including by dropping
/// the requeue future) releases the count.
pub(crate) struct RetryReservation(Arc<AtomicUsize>);

impl RetryReservation {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for RetryReservation {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct BoundedQueue<T> {
    config: QueueConfig,
    state: Mutex<QueueState<T>>,
    dead_letters: Mutex<VecDeque<QueuedMessage<T>>>,
    retrying: Arc<AtomicUsize>,
    stats: StatsRecorder,
    notifier: Option<Arc<NotificationManager>>,
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("name", &self.config.name)
            .field("len", &self.len())
            .field("capacity", &self.config.max_capacity)
            .finish()
    }
}

impl<T> BoundedQueue<T> {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(QueueState {
                pending: BTreeMap::new(),
                next_sequence: 0,
                in_flight: HashMap::new(),
            }),
            dead_letters: Mutex::new(VecDeque::new()),
            retrying: Arc::new(AtomicUsize::new(0)),
            stats: StatsRecorder::new(),
            notifier: None,
        })
    }

    /// Create a queue that publishes lifecycle events to `notifier`
    pub fn with_notifications(
        config: QueueConfig,
        notifier: Arc<NotificationManager>,
    ) -> QueueResult<Self> {
        let mut queue = Self::new(config)?;
        queue.notifier = Some(notifier);
        Ok(queue)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.max_capacity
    }

    fn state(&self) -> MutexGuard<'_, QueueState<T>> {
        recover_poisoned(self.state.lock(), "queue state")
    }

    fn dead_letter_area(&self) -> MutexGuard<'_, VecDeque<QueuedMessage<T>>> {
        recover_poisoned(self.dead_letters.lock(), "dead-letter area")
    }

    fn emit(&self, event: QueueEvent) {
        if let Some(notifier) = &self.notifier {
            notifier.publish_or_log(Event::Queue(event));
        }
    }

    /// Messages waiting in the holding area
    pub fn len(&self) -> usize {
        self.state().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.config.max_capacity
    }

    pub fn in_flight_count(&self) -> usize {
        self.state().in_flight.len()
    }

    pub fn dead_letter_count(&self) -> usize {
        self.dead_letter_area().len()
    }

    /// Messages currently waiting out a retry backoff
    pub fn retrying_count(&self) -> usize {
        self.retrying.load(Ordering::SeqCst)
    }

    /// No message is queued, in flight or waiting to be retried
    pub fn is_idle(&self) -> bool {
        let state = self.state();
        state.pending.is_empty() && state.in_flight.is_empty() && self.retrying_count() == 0
    }

    /// Add a message, returning `false` when the queue is at capacity
    pub fn enqueue(&self, message: QueuedMessage<T>) -> bool {
        self.try_enqueue(message).is_ok()
    }

    /// Add a message, reporting a full queue as [`QueueError::QueueFull`]
    pub fn try_enqueue(&self, mut message: QueuedMessage<T>) -> QueueResult<MessageId> {
        let id = message.id();
        let size = {
            let mut state = self.state();
            if state.pending.len() >= self.config.max_capacity {
                drop(state);
                self.stats.record_rejected();
                log::warn!(
                    "Queue '{}' rejected message {}: at capacity {}",
                    self.config.name,
                    id,
                    self.config.max_capacity
                );
                return Err(QueueError::QueueFull {
                    queue_name: self.config.name.clone(),
                    max_capacity: self.config.max_capacity,
                });
            }
            message.mark_queued();
            state.admit(message, self.config.priority_enabled)
        };

        self.stats.record_enqueued(size);
        log::debug!("Queue '{}' enqueued {} (size {})", self.config.name, id, size);
        self.emit(QueueEvent::for_message(
            QueueEventType::Enqueued,
            &self.config.name,
            id,
            size,
        ));
        Ok(id)
    }

    /// Take the next eligible message without waiting
    pub fn dequeue(&self, cancel: &CancellationToken) -> Option<QueuedMessage<T>> {
        if cancel.is_cancelled() {
            return None;
        }

        let (message, size) = {
            let mut state = self.state();
            let (_, mut message) = state.pending.pop_first()?;
            message.mark_processing();
            state.in_flight.insert(message.id(), Instant::now());
            (message, state.pending.len())
        };

        log::debug!(
            "Queue '{}' dequeued {} (size {})",
            self.config.name,
            message.id(),
            size
        );
        self.emit(QueueEvent::for_message(
            QueueEventType::Dequeued,
            &self.config.name,
            message.id(),
            size,
        ));
        Some(message)
    }

    /// Take up to `min(max_count, batch_size)` messages without waiting
    pub fn dequeue_batch(
        &self,
        max_count: usize,
        cancel: &CancellationToken,
    ) -> Vec<QueuedMessage<T>> {
        if cancel.is_cancelled() {
            return Vec::new();
        }

        let limit = max_count.min(self.config.batch_size);
        let (batch, size) = {
            let mut state = self.state();
            let mut batch = Vec::with_capacity(limit.min(state.pending.len()));
            while batch.len() < limit {
                let Some((_, mut message)) = state.pending.pop_first() else {
                    break;
                };
                message.mark_processing();
                state.in_flight.insert(message.id(), Instant::now());
                batch.push(message);
            }
            (batch, state.pending.len())
        };

        for message in &batch {
            self.emit(QueueEvent::for_message(
                QueueEventType::Dequeued,
                &self.config.name,
                message.id(),
                size,
            ));
        }
        batch
    }

    /// Move a message to the dead-letter area; it is never retried automatically
    pub fn move_to_dead_letter(&self, mut message: QueuedMessage<T>) {
        let id = message.id();
        self.state().in_flight.remove(&id);

        message.status = MessageStatus::DeadLetter;
        log::error!(
            "Queue '{}' dead-lettered message {} after {} retries: {}",
            self.config.name,
            id,
            message.retry_count,
            message.last_error().unwrap_or("no error recorded")
        );

        let size = {
            let mut dead_letters = self.dead_letter_area();
            dead_letters.push_back(message);
            dead_letters.len()
        };
        self.stats.record_dead_lettered();
        self.emit(QueueEvent::for_message(
            QueueEventType::DeadLettered,
            &self.config.name,
            id,
            size,
        ));
    }

    /// Empty the holding area; in-flight and dead-lettered messages are kept
    pub fn clear(&self) -> usize {
        let cleared = {
            let mut state = self.state();
            let cleared = state.pending.len();
            state.pending.clear();
            cleared
        };

        log::info!("Queue '{}' cleared {} messages", self.config.name, cleared);
        self.emit(
            QueueEvent::new(QueueEventType::Cleared, &self.config.name)
                .with_size(0)
                .with_message(format!("cleared {} messages", cleared)),
        );
        cleared
    }

    /// Record a successful delivery; `false` if the id was not in flight
    pub fn mark_completed(&self, id: MessageId, elapsed: Duration) -> bool {
        {
            // Counted under the lock: an idle queue has every completion recorded
            let mut state = self.state();
            if state.in_flight.remove(&id).is_none() {
                return false;
            }
            self.stats.record_completed(elapsed);
        }

        log::debug!(
            "Queue '{}' completed {} in {:?}",
            self.config.name,
            id,
            elapsed
        );
        self.emit(QueueEvent {
            message_id: Some(id),
            ..QueueEvent::new(QueueEventType::Completed, &self.config.name)
        });
        true
    }

    /// Record a failed delivery; `false` if the id was not in flight
    pub fn mark_failed(&self, id: MessageId, error: &str) -> bool {
        if self.state().in_flight.remove(&id).is_none() {
            return false;
        }

        self.stats.record_failed();
        log::warn!("Queue '{}' delivery of {} failed: {}", self.config.name, id, error);
        self.emit(QueueEvent {
            message_id: Some(id),
            ..QueueEvent::new(QueueEventType::Failed, &self.config.name).with_message(error)
        });
        true
    }

    /// Remove and return every dead-lettered message
    pub fn drain_dead_letters(&self) -> Vec<QueuedMessage<T>> {
        self.dead_letter_area().drain(..).collect()
    }

    /// Re-admit dead-lettered messages with a fresh retry budget
    ///
    /// Messages that do not fit stay in the dead-letter area. Returns the
    /// number re-admitted.
    pub fn redrive_dead_letters(&self) -> usize {
        let drained = self.drain_dead_letters();
        let mut rejected = Vec::new();
        let mut redriven = 0;

        for mut message in drained {
            let id = message.id();
            let size = {
                let mut state = self.state();
                if state.pending.len() >= self.config.max_capacity {
                    rejected.push(message);
                    continue;
                }
                message.retry_count = 0;
                message.mark_queued();
                state.admit(message, self.config.priority_enabled)
            };
            self.stats.record_enqueued(size);
            redriven += 1;
            self.emit(QueueEvent::for_message(
                QueueEventType::Requeued,
                &self.config.name,
                id,
                size,
            ));
        }

        if !rejected.is_empty() {
            log::warn!(
                "Queue '{}' could not redrive {} dead letters: at capacity",
                self.config.name,
                rejected.len()
            );
            let mut dead_letters = self.dead_letter_area();
            for message in rejected.into_iter().rev() {
                dead_letters.push_front(message);
            }
        }

        log::info!(
            "Queue '{}' redrove {} dead letters",
            self.config.name,
            redriven
        );
        redriven
    }

    pub fn statistics(&self) -> QueueStatistics {
        let (queued, in_flight) = {
            let state = self.state();
            (state.pending.len(), state.in_flight.len())
        };
        let dead_letters = self.dead_letter_count();
        self.stats.snapshot(
            &self.config.name,
            queued,
            in_flight,
            dead_letters,
            self.config.max_capacity,
        )
    }
}

impl<T: Send> BoundedQueue<T> {
    /// Mark a retry as pending before the failed message leaves the in-flight table
    pub(crate) fn reserve_retry(&self) -> RetryReservation {
        RetryReservation::new(&self.retrying)
    }

    /// Hand a failed message back for a delayed retry
    ///
    /// The delay for a message that has been retried `n` times is
    /// `retry_base_interval * 2^n`, capped by `retry_max_interval`. Once the
    /// retry count reaches `max_retries` the message is dead-lettered instead.
    pub async fn requeue(&self, message: QueuedMessage<T>) -> RequeueOutcome {
        let reservation = self.reserve_retry();
        self.requeue_reserved(message, reservation, &CancellationToken::new())
            .await
    }

    /// Requeue under an existing reservation
    ///
    /// Cancelling `cancel` cuts the backoff short: the message is re-admitted
    /// immediately so that it is not lost when processing stops.
    pub(crate) async fn requeue_reserved(
        &self,
        mut message: QueuedMessage<T>,
        _reservation: RetryReservation,
        cancel: &CancellationToken,
    ) -> RequeueOutcome {
        if message.retry_count >= self.config.max_retries {
            self.move_to_dead_letter(message);
            return RequeueOutcome::DeadLettered;
        }

        let id = message.id();
        self.state().in_flight.remove(&id);
        message.status = MessageStatus::Failed;

        let delay = self.config.backoff().delay_for_attempt(message.retry_count);
        message.retry_count += 1;
        let attempt = message.retry_count;
        log::debug!(
            "Queue '{}' retrying {} (attempt {}/{}) in {:?}",
            self.config.name,
            id,
            attempt,
            self.config.max_retries,
            delay
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                log::debug!(
                    "Queue '{}' re-admitting {} early: processing stopped",
                    self.config.name,
                    id
                );
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let readmitted = {
            let mut state = self.state();
            if state.pending.len() >= self.config.max_capacity {
                Err(message)
            } else {
                message.mark_queued();
                Ok(state.admit(message, self.config.priority_enabled))
            }
        };

        match readmitted {
            Ok(size) => {
                self.stats.record_enqueued(size);
                self.emit(QueueEvent::for_message(
                    QueueEventType::Requeued,
                    &self.config.name,
                    id,
                    size,
                ));
                RequeueOutcome::Requeued { attempt, delay }
            }
            Err(mut message) => {
                self.stats.record_rejected();
                message.metadata.insert(
                    LAST_ERROR_KEY.to_string(),
                    format!(
                        "requeue rejected: queue '{}' at capacity {}",
                        self.config.name, self.config.max_capacity
                    ),
                );
                self.move_to_dead_letter(message);
                RequeueOutcome::RejectedAtCapacity
            }
        }
    }
}

impl<T: Clone> BoundedQueue<T> {
    /// Clone of the next eligible message
    pub fn peek(&self) -> Option<QueuedMessage<T>> {
        self.state().pending.values().next().cloned()
    }

    pub fn dead_letter_snapshot(&self) -> Vec<QueuedMessage<T>> {
        self.dead_letter_area().iter().cloned().collect()
    }
}
