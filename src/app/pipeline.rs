//! Stdin to HTTP delivery pipeline
//!
//! Each non-empty input line becomes one record: valid JSON is sent as is,
//! anything else is sent as a JSON string. Records flow through a single
//! bounded queue into an [`HttpDeliveryProcessor`].

use crate::app::config::{AppConfig, PipelineConfig};
use crate::app::display::summary_line;
use crate::app::error::AppResult;
use crate::core::retry::{retry_async, RetryPolicy};
use crate::notifications::api::{
    Event, EventFilter, EventReceiver, NotificationManager, QueueEventType, SystemEvent,
    SystemEventType,
};
use crate::processor::api::HttpDeliveryProcessor;
use crate::queue::api::{BoundedQueue, QueueManager, QueueStatistics, QueuedMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub type Record = serde_json::Value;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub accepted: usize,
    pub dropped: usize,
    /// Whether the queue emptied before the drain timeout
    pub drained: bool,
    pub statistics: Vec<QueueStatistics>,
}

pub fn parse_record(line: &str) -> Option<Record> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed).unwrap_or_else(|_| Record::String(trimmed.to_string())))
}

/// Enqueue a record, waiting and retrying while the queue is full
pub async fn enqueue_with_retry(
    queue: &BoundedQueue<Record>,
    record: Record,
    config: &PipelineConfig,
) -> bool {
    let policy = RetryPolicy {
        max_attempts: config.enqueue_attempts,
        delay: config.enqueue_retry_delay,
    };
    let result = retry_async("enqueue", policy, || {
        let message = QueuedMessage::new(record.clone());
        async move { queue.try_enqueue(message) }
    })
    .await;

    match result {
        Ok(_) => true,
        Err(e) => {
            log::warn!("Dropping record: {}", e);
            false
        }
    }
}

/// Wait until nothing is queued, in flight or retrying; `false` on timeout
pub async fn wait_for_drain<T>(queue: &BoundedQueue<T>, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while !queue.is_idle() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
    true
}

fn spawn_stats_reporter(
    queue: Arc<BoundedQueue<Record>>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => log::info!("{}", summary_line(&queue.statistics())),
            }
        }
    })
}

fn spawn_event_monitor(mut events: EventReceiver, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            match event {
                Event::Queue(event) if event.event_type == QueueEventType::DeadLettered => {
                    log::debug!(
                        "Record {:?} dead-lettered on queue '{}'",
                        event.message_id,
                        event.queue_name
                    );
                }
                Event::System(event) => {
                    log::info!(
                        "{:?}: {}",
                        event.event_type,
                        event.message.as_deref().unwrap_or("")
                    );
                }
                _ => {}
            }
        }
    })
}

/// Deliver every record read from `input`, then drain and shut down
///
/// Input stops at EOF or when `shutdown` is cancelled; in both cases the
/// queue is given `drain_timeout` to empty before processing stops.
pub async fn run_pipeline<R>(
    input: R,
    config: &AppConfig,
    shutdown: CancellationToken,
) -> AppResult<PipelineReport>
where
    R: AsyncBufRead + Unpin,
{
    let notifier = Arc::new(NotificationManager::new());
    let events = notifier.subscribe(
        "pipeline-monitor".to_string(),
        EventFilter::QueueAndSystem,
        "app:pipeline".to_string(),
    )?;
    let background = CancellationToken::new();
    let monitor = spawn_event_monitor(events, background.clone());

    let manager = QueueManager::with_notifications(config.manager.clone(), notifier.clone());
    let queue_name = config.queue.name.clone();
    let queue = manager
        .create_queue::<Record>(&queue_name, config.queue.clone())
        .await?;
    let processor = Arc::new(HttpDeliveryProcessor::<Record>::new(config.delivery.clone())?);
    manager
        .start_processing::<Record>(&queue_name, processor)
        .await?;
    notifier.publish_or_log(Event::System(SystemEvent::with_message(
        SystemEventType::Startup,
        format!("delivering to {}", config.delivery.endpoint),
    )));

    let reporter = (!config.pipeline.stats_interval.is_zero()).then(|| {
        spawn_stats_reporter(
            queue.clone(),
            config.pipeline.stats_interval,
            background.clone(),
        )
    });

    let mut lines = input.lines();
    let (mut accepted, mut dropped) = (0, 0);
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("Input closed early on shutdown request");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        let Some(record) = parse_record(&line) else {
            continue;
        };
        if enqueue_with_retry(&queue, record, &config.pipeline).await {
            accepted += 1;
        } else {
            dropped += 1;
        }
    }
    log::info!("Input finished: {} records accepted, {} dropped", accepted, dropped);

    let drained = wait_for_drain(&queue, config.pipeline.drain_timeout).await;
    if !drained {
        log::warn!(
            "Queue '{}' not drained within {:?}: {}",
            queue_name,
            config.pipeline.drain_timeout,
            summary_line(&queue.statistics())
        );
        notifier.publish_or_log(Event::System(SystemEvent::with_message(
            SystemEventType::ShutdownTimeout,
            format!("queue '{}' not drained", queue_name),
        )));
    }

    manager.shutdown().await;
    notifier.publish_or_log(Event::System(SystemEvent::with_message(
        SystemEventType::Shutdown,
        format!("{} records accepted", accepted),
    )));
    let statistics = manager.all_statistics().await;

    background.cancel();
    if let Some(reporter) = reporter {
        let _ = reporter.await;
    }
    let _ = monitor.await;

    Ok(PipelineReport {
        accepted,
        dropped,
        drained,
        statistics,
    })
}
