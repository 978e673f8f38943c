//! QueueManager - registry and processing loops for named queues
//!
//! Each named queue may be bound to one delivery processor. Binding spawns
//! `worker_count` tokio tasks that share a cancellation token; each task
//! dequeues (singly or in batches), hands messages to the processor and
//! routes the results back into the queue:
//!
//! ```text
//!   success           -> mark_completed
//!   failure, retry    -> mark_failed + requeue (delayed, own task)
//!   failure, no retry -> mark_failed + move_to_dead_letter
//!   can_process false -> mark_failed + move_to_dead_letter
//!   can_process panic -> mark_failed + move_to_dead_letter, then error_pause
//!   processor panic   -> retryable failure, then pause for error_pause
//! ```
//!
//! Requeues run as their own tasks, tracked per queue. Stopping a queue cuts
//! their backoff short and waits for them within the same `stop_timeout`.

use crate::core::sync::recover_poisoned;
use crate::notifications::api::{Event, NotificationManager, QueueEvent, QueueEventType};
use crate::processor::api::{DeliveryProcessor, ProcessingResult};
use crate::queue::config::{ManagerConfig, QueueConfig};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::health::QueueHealth;
use crate::queue::internal::BoundedQueue;
use crate::queue::message::QueuedMessage;
use crate::queue::stats::QueueStatistics;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Type-erased operations the manager needs on every queue
trait QueueControl: Send + Sync {
    fn clear(&self) -> usize;
    fn statistics(&self) -> QueueStatistics;
}

impl<T: Send + Sync + 'static> QueueControl for BoundedQueue<T> {
    fn clear(&self) -> usize {
        BoundedQueue::clear(self)
    }

    fn statistics(&self) -> QueueStatistics {
        BoundedQueue::statistics(self)
    }
}

/// Requeue tasks spawned by one queue's workers
#[derive(Clone)]
struct RetryTasks {
    tasks: Arc<Mutex<JoinSet<()>>>,
    cancel: CancellationToken,
}

impl RetryTasks {
    fn new(cancel: CancellationToken) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(JoinSet::new())),
            cancel,
        }
    }

    fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) {
        let mut tasks = recover_poisoned(self.tasks.lock(), "retry tasks");
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    fn take(&self) -> JoinSet<()> {
        std::mem::take(&mut *recover_poisoned(self.tasks.lock(), "retry tasks"))
    }
}

struct ProcessingHandle {
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    retries: RetryTasks,
}

impl ProcessingHandle {
    fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.workers.iter().any(|w| !w.is_finished())
    }
}

struct QueueEntry {
    queue: Arc<dyn Any + Send + Sync>,
    control: Arc<dyn QueueControl>,
    processing: Option<ProcessingHandle>,
}

impl QueueEntry {
    fn is_processing(&self) -> bool {
        self.processing.as_ref().is_some_and(ProcessingHandle::is_running)
    }
}

/// Registry of named queues and their processing loops
///
/// Managers are independent instances; nothing is global, so several can
/// coexist (one per pipeline, or one per test).
///
/// # Example
///
/// ```rust,no_run
/// use outflow::queue::api::*;
///
/// # async fn example() -> QueueResult<()> {
/// let manager = QueueManager::new(ManagerConfig::default());
/// let queue = manager
///     .create_queue::<String>("outbound", QueueConfig::default())
///     .await?;
/// queue.enqueue(QueuedMessage::new("hello".to_string()));
/// println!("{:?}", manager.queue_health("outbound").await.status);
/// # Ok(())
/// # }
/// ```
pub struct QueueManager {
    config: ManagerConfig,
    queues: RwLock<HashMap<String, QueueEntry>>,
    paused: Arc<AtomicBool>,
    shutdown: CancellationToken,
    notifier: Option<Arc<NotificationManager>>,
}

impl QueueManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            queues: RwLock::new(HashMap::new()),
            paused: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
            notifier: None,
        }
    }

    /// Create a manager whose queues publish lifecycle events to `notifier`
    pub fn with_notifications(config: ManagerConfig, notifier: Arc<NotificationManager>) -> Self {
        Self {
            notifier: Some(notifier),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn emit(&self, event: QueueEvent) {
        if let Some(notifier) = &self.notifier {
            notifier.publish_or_log(Event::Queue(event));
        }
    }

    pub async fn create_queue<T: Send + Sync + 'static>(
        &self,
        name: &str,
        mut config: QueueConfig,
    ) -> QueueResult<Arc<BoundedQueue<T>>> {
        config.name = name.to_string();
        let queue = Arc::new(match &self.notifier {
            Some(notifier) => BoundedQueue::with_notifications(config, notifier.clone())?,
            None => BoundedQueue::new(config)?,
        });

        let mut queues = self.queues.write().await;
        if queues.contains_key(name) {
            return Err(QueueError::QueueAlreadyExists {
                queue_name: name.to_string(),
            });
        }
        queues.insert(
            name.to_string(),
            QueueEntry {
                queue: queue.clone(),
                control: queue.clone(),
                processing: None,
            },
        );

        log::info!(
            "Created queue '{}' (capacity {}, workers {})",
            name,
            queue.capacity(),
            queue.config().worker_count
        );
        Ok(queue)
    }

    /// The named queue, or `None` if absent or holding another payload type
    pub async fn get_queue<T: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Option<Arc<BoundedQueue<T>>> {
        let queues = self.queues.read().await;
        queues
            .get(name)
            .and_then(|entry| entry.queue.clone().downcast::<BoundedQueue<T>>().ok())
    }

    /// Stop the queue's processing and drop it from the registry
    pub async fn remove_queue(&self, name: &str) -> bool {
        let entry = self.queues.write().await.remove(name);
        match entry {
            Some(mut entry) => {
                if let Some(handle) = entry.processing.take() {
                    self.join_workers(name, handle).await;
                }
                log::info!("Removed queue '{}'", name);
                true
            }
            None => false,
        }
    }

    /// Bind a processor to a queue and start its worker tasks
    ///
    /// Returns `Ok(false)` if the queue is already being processed.
    pub async fn start_processing<T: Send + Sync + 'static>(
        &self,
        name: &str,
        processor: Arc<dyn DeliveryProcessor<T>>,
    ) -> QueueResult<bool> {
        if self.shutdown.is_cancelled() {
            return Err(QueueError::Internal {
                message: "queue manager has been shut down".to_string(),
            });
        }

        let mut queues = self.queues.write().await;
        let entry = queues.get_mut(name).ok_or_else(|| QueueError::QueueNotFound {
            queue_name: name.to_string(),
        })?;
        if entry.is_processing() {
            return Ok(false);
        }
        let queue = entry
            .queue
            .clone()
            .downcast::<BoundedQueue<T>>()
            .map_err(|_| QueueError::TypeMismatch {
                queue_name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })?;

        let cancel = self.shutdown.child_token();
        let retries = RetryTasks::new(cancel.clone());
        let worker_count = queue.config().worker_count;
        let workers = (0..worker_count)
            .map(|worker| {
                tokio::spawn(run_worker(
                    queue.clone(),
                    processor.clone(),
                    retries.clone(),
                    self.paused.clone(),
                    self.config.clone(),
                    worker,
                ))
            })
            .collect();
        entry.processing = Some(ProcessingHandle {
            cancel,
            workers,
            retries,
        });
        drop(queues);

        log::info!(
            "Started processing queue '{}' with processor '{}' ({} workers{})",
            name,
            processor.name(),
            worker_count,
            if processor.supports_batch() { ", batch mode" } else { "" }
        );
        self.emit(
            QueueEvent::new(QueueEventType::ProcessingStarted, name)
                .with_message(processor.name().to_string()),
        );
        Ok(true)
    }

    /// Cancel a queue's workers, waiting up to `stop_timeout` before aborting them
    pub async fn stop_processing(&self, name: &str) -> bool {
        let handle = {
            let mut queues = self.queues.write().await;
            queues.get_mut(name).and_then(|entry| entry.processing.take())
        };
        match handle {
            Some(handle) => {
                self.join_workers(name, handle).await;
                true
            }
            None => false,
        }
    }

    async fn join_workers(&self, name: &str, handle: ProcessingHandle) {
        handle.cancel.cancel();
        let deadline = Instant::now() + self.config.stop_timeout;

        for mut worker in handle.workers {
            if tokio::time::timeout_at(deadline, &mut worker).await.is_err() {
                log::warn!(
                    "Worker for queue '{}' did not stop within {:?}; aborting",
                    name,
                    self.config.stop_timeout
                );
                worker.abort();
            }
        }

        // Cancellation has already cut every pending backoff short
        let mut retries = handle.retries.take();
        loop {
            match tokio::time::timeout_at(deadline, retries.join_next()).await {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => {
                    log::warn!(
                        "Queue '{}' abandoning {} pending requeues after {:?}",
                        name,
                        retries.len(),
                        self.config.stop_timeout
                    );
                    retries.abort_all();
                    break;
                }
            }
        }

        log::info!("Stopped processing queue '{}'", name);
        self.emit(QueueEvent::new(QueueEventType::ProcessingStopped, name));
    }

    pub async fn is_processing(&self, name: &str) -> bool {
        let queues = self.queues.read().await;
        queues.get(name).is_some_and(QueueEntry::is_processing)
    }

    pub async fn queue_health(&self, name: &str) -> QueueHealth {
        let queues = self.queues.read().await;
        match queues.get(name) {
            Some(entry) => self.evaluate(entry),
            None => QueueHealth::missing(name),
        }
    }

    pub async fn all_health(&self) -> Vec<QueueHealth> {
        let queues = self.queues.read().await;
        let mut health: Vec<QueueHealth> = queues.values().map(|e| self.evaluate(e)).collect();
        health.sort_by(|a, b| a.queue_name.cmp(&b.queue_name));
        health
    }

    fn evaluate(&self, entry: &QueueEntry) -> QueueHealth {
        let active = entry.is_processing() && !self.is_paused();
        QueueHealth::evaluate(
            entry.control.statistics(),
            active,
            self.config.slow_processing_threshold,
        )
    }

    pub async fn queue_statistics(&self, name: &str) -> Option<QueueStatistics> {
        let queues = self.queues.read().await;
        queues.get(name).map(|entry| entry.control.statistics())
    }

    /// Statistics for every queue, ordered by queue name
    pub async fn all_statistics(&self) -> Vec<QueueStatistics> {
        let queues = self.queues.read().await;
        let mut stats: Vec<QueueStatistics> =
            queues.values().map(|e| e.control.statistics()).collect();
        stats.sort_by(|a, b| a.queue_name.cmp(&b.queue_name));
        stats
    }

    /// Workers keep running but stop taking messages until resumed
    pub fn pause_all(&self) {
        self.paused.store(true, Ordering::SeqCst);
        log::info!("Paused all queue processing");
    }

    pub fn resume_all(&self) {
        self.paused.store(false, Ordering::SeqCst);
        log::info!("Resumed all queue processing");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub async fn clear_queue(&self, name: &str) -> QueueResult<usize> {
        let queues = self.queues.read().await;
        let entry = queues.get(name).ok_or_else(|| QueueError::QueueNotFound {
            queue_name: name.to_string(),
        })?;
        Ok(entry.control.clear())
    }

    pub async fn clear_all_queues(&self) -> usize {
        let queues = self.queues.read().await;
        queues.values().map(|entry| entry.control.clear()).sum()
    }

    pub async fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn queue_count(&self) -> usize {
        self.queues.read().await.len()
    }

    /// Stop every processing loop; queues stay registered for inspection
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handles: Vec<(String, ProcessingHandle)> = {
            let mut queues = self.queues.write().await;
            queues
                .iter_mut()
                .filter_map(|(name, entry)| entry.processing.take().map(|h| (name.clone(), h)))
                .collect()
        };

        for (name, handle) in handles {
            self.join_workers(&name, handle).await;
        }

        for name in self.queue_names().await {
            self.emit(QueueEvent::new(QueueEventType::Shutdown, name));
        }
        log::info!("Queue manager shut down");
    }
}

/// Sleep for `wait`, returning early on cancellation
async fn idle(wait: Duration, cancel: &CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(wait) => {}
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn run_worker<T: Send + Sync + 'static>(
    queue: Arc<BoundedQueue<T>>,
    processor: Arc<dyn DeliveryProcessor<T>>,
    retries: RetryTasks,
    paused: Arc<AtomicBool>,
    config: ManagerConfig,
    worker: usize,
) {
    let cancel = retries.cancel.clone();
    log::debug!("Worker {} for queue '{}' started", worker, queue.name());
    let batch_size = queue.config().batch_size;
    let batch_timeout = queue.config().batch_timeout;
    let mut fill_started: Option<Instant> = None;

    while !cancel.is_cancelled() {
        if paused.load(Ordering::SeqCst) {
            idle(config.idle_wait, &cancel).await;
            continue;
        }

        let panicked = if processor.supports_batch() {
            let available = queue.len();
            if available == 0 {
                fill_started = None;
                idle(config.idle_wait, &cancel).await;
                continue;
            }
            // Let a partial batch fill until batch_timeout has passed
            if available < batch_size {
                let started = *fill_started.get_or_insert_with(Instant::now);
                if started.elapsed() < batch_timeout {
                    idle(config.idle_wait.min(batch_timeout), &cancel).await;
                    continue;
                }
            }
            fill_started = None;

            let batch = queue.dequeue_batch(batch_size, &cancel);
            if batch.is_empty() {
                continue;
            }
            deliver_batch(&queue, processor.as_ref(), &retries, batch).await
        } else {
            match queue.dequeue(&cancel) {
                Some(message) => {
                    deliver_one(&queue, processor.as_ref(), &retries, message).await
                }
                None => {
                    idle(config.idle_wait, &cancel).await;
                    continue;
                }
            }
        };

        if panicked {
            idle(config.error_pause, &cancel).await;
        }
    }

    log::debug!("Worker {} for queue '{}' stopped", worker, queue.name());
}

/// Dead-letter a message the processor declined
fn reject<T: Send + Sync + 'static>(
    queue: &BoundedQueue<T>,
    mut message: QueuedMessage<T>,
    reason: String,
) {
    message.record_failure(&reason);
    if queue.mark_failed(message.id(), &reason) {
        queue.move_to_dead_letter(message);
    }
}

/// Ask the processor whether it accepts `message`; a panic counts as a refusal
///
/// Returns `(accepted, panicked)`. Refused messages are dead-lettered.
fn screen<T: Send + Sync + 'static>(
    queue: &BoundedQueue<T>,
    processor: &dyn DeliveryProcessor<T>,
    message: QueuedMessage<T>,
) -> (Option<QueuedMessage<T>>, bool) {
    match std::panic::catch_unwind(AssertUnwindSafe(|| processor.can_process(&message))) {
        Ok(true) => (Some(message), false),
        Ok(false) => {
            let reason = format!("processor '{}' cannot process message", processor.name());
            reject(queue, message, reason);
            (None, false)
        }
        Err(panic) => {
            let text = panic_message(panic.as_ref());
            log::error!(
                "Processor '{}' panicked checking message {} on queue '{}': {}",
                processor.name(),
                message.id(),
                queue.name(),
                text
            );
            let reason = format!(
                "processor '{}' panicked in can_process: {}",
                processor.name(),
                text
            );
            reject(queue, message, reason);
            (None, true)
        }
    }
}

/// Returns `true` if the processor panicked
async fn deliver_one<T: Send + Sync + 'static>(
    queue: &Arc<BoundedQueue<T>>,
    processor: &dyn DeliveryProcessor<T>,
    retries: &RetryTasks,
    message: QueuedMessage<T>,
) -> bool {
    let message = match screen(queue, processor, message) {
        (Some(message), _) => message,
        (None, panicked) => return panicked,
    };

    let started = Instant::now();
    let outcome = AssertUnwindSafe(processor.process(&message))
        .catch_unwind()
        .await;
    let (result, panicked) = match outcome {
        Ok(result) => (result, false),
        Err(panic) => {
            let text = panic_message(panic.as_ref());
            log::error!(
                "Processor '{}' panicked on queue '{}': {}",
                processor.name(),
                queue.name(),
                text
            );
            let error = format!("processor '{}' panicked: {}", processor.name(), text);
            (
                ProcessingResult::retryable_failure(error, started.elapsed()),
                true,
            )
        }
    };

    route(queue, retries, message, result);
    panicked
}

/// Returns `true` if the processor panicked
async fn deliver_batch<T: Send + Sync + 'static>(
    queue: &Arc<BoundedQueue<T>>,
    processor: &dyn DeliveryProcessor<T>,
    retries: &RetryTasks,
    batch: Vec<QueuedMessage<T>>,
) -> bool {
    let mut screen_panicked = false;
    let mut deliverable = Vec::with_capacity(batch.len());
    for message in batch {
        let (accepted, panicked) = screen(queue, processor, message);
        screen_panicked |= panicked;
        deliverable.extend(accepted);
    }
    if deliverable.is_empty() {
        return screen_panicked;
    }

    let started = Instant::now();
    let outcome = AssertUnwindSafe(processor.process_batch(&deliverable))
        .catch_unwind()
        .await;

    match outcome {
        Ok(batch_result) => {
            for message in deliverable {
                let result = batch_result
                    .result_for(message.id())
                    .cloned()
                    .unwrap_or_else(|| {
                        ProcessingResult::retryable_failure(
                            "message missing from batch result",
                            batch_result.total_elapsed,
                        )
                    });
                route(queue, retries, message, result);
            }
            screen_panicked
        }
        Err(panic) => {
            let text = panic_message(panic.as_ref());
            log::error!(
                "Processor '{}' panicked on a batch of {} from queue '{}': {}",
                processor.name(),
                deliverable.len(),
                queue.name(),
                text
            );
            let error = format!("processor '{}' panicked: {}", processor.name(), text);
            let elapsed = started.elapsed();
            for message in deliverable {
                route(
                    queue,
                    retries,
                    message,
                    ProcessingResult::retryable_failure(error.clone(), elapsed),
                );
            }
            true
        }
    }
}

fn route<T: Send + Sync + 'static>(
    queue: &Arc<BoundedQueue<T>>,
    retries: &RetryTasks,
    mut message: QueuedMessage<T>,
    result: ProcessingResult,
) {
    let id = message.id();
    if result.success {
        queue.mark_completed(id, result.elapsed);
        return;
    }

    let error = result.error_text().to_string();
    message.record_failure(&error);
    // Reserved before the message leaves the in-flight table
    let reservation = result.should_retry.then(|| queue.reserve_retry());
    if !queue.mark_failed(id, &error) {
        log::debug!(
            "Message {} no longer in flight on queue '{}'; dropping outcome",
            id,
            queue.name()
        );
        return;
    }

    match reservation {
        Some(reservation) => {
            let queue = queue.clone();
            let cancel = retries.cancel.clone();
            retries.spawn(async move {
                queue.requeue_reserved(message, reservation, &cancel).await;
            });
        }
        None => queue.move_to_dead_letter(message),
    }
}
