//! NotificationManager implementation
//!
//! Subscribers receive events over unbounded channels so publishing never
//! blocks the queue's hot paths. Subscribers whose receiver has been dropped
//! are removed on the next publish.

use crate::core::sync::handle_mutex_poison;
use crate::notifications::error::{NotificationError, NotificationResult};
use crate::notifications::event::{Event, EventFilter};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub type EventReceiver = UnboundedReceiver<Event>;

struct SubscriberInfo {
    filter: EventFilter,
    source: String,
    sender: UnboundedSender<Event>,
    events_sent: AtomicUsize,
}

#[derive(Default)]
pub struct NotificationManager {
    subscribers: RwLock<HashMap<String, SubscriberInfo>>,
}

impl std::fmt::Debug for NotificationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationManager")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn internal(message: String) -> NotificationError {
    NotificationError::Internal { message }
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        subscriber_id: String,
        filter: EventFilter,
        source: String,
    ) -> NotificationResult<EventReceiver> {
        let (sender, receiver) = unbounded_channel();

        let subscriber_info = SubscriberInfo {
            filter,
            source: source.clone(),
            sender,
            events_sent: AtomicUsize::new(0),
        };

        let mut subscribers = handle_mutex_poison(self.subscribers.write(), internal)?;
        if let Some(existing) = subscribers.insert(subscriber_id.clone(), subscriber_info) {
            log::warn!(
                "Subscriber '{}' replaced existing subscription (source: {} -> {})",
                subscriber_id,
                existing.source,
                source
            );
        }

        Ok(receiver)
    }

    pub fn unsubscribe(&self, subscriber_id: &str) -> bool {
        match self.subscribers.write() {
            Ok(mut subscribers) => subscribers.remove(subscriber_id).is_some(),
            Err(_) => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn has_subscriber(&self, subscriber_id: &str) -> bool {
        self.subscribers
            .read()
            .map(|s| s.contains_key(subscriber_id))
            .unwrap_or(false)
    }

    /// Number of events delivered to a subscriber's channel so far
    pub fn events_sent(&self, subscriber_id: &str) -> Option<usize> {
        self.subscribers
            .read()
            .ok()?
            .get(subscriber_id)
            .map(|info| info.events_sent.load(Ordering::Relaxed))
    }

    /// Deliver an event to every subscriber whose filter accepts it
    pub fn publish(&self, event: Event) -> NotificationResult<()> {
        let mut failed_subscribers = Vec::new();

        {
            let subscribers = handle_mutex_poison(self.subscribers.read(), internal)?;
            for (subscriber_id, info) in subscribers.iter() {
                if !info.filter.accepts(&event) {
                    continue;
                }
                if info.sender.send(event.clone()).is_err() {
                    failed_subscribers.push(subscriber_id.clone());
                } else {
                    info.events_sent.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        if failed_subscribers.is_empty() {
            return Ok(());
        }

        let mut subscribers = handle_mutex_poison(self.subscribers.write(), internal)?;
        for subscriber_id in &failed_subscribers {
            subscribers.remove(subscriber_id);
        }

        Err(NotificationError::PublishFailed {
            event_type: event.kind().to_string(),
            failed_subscribers,
        })
    }

    /// Publish, logging instead of returning any failure
    pub fn publish_or_log(&self, event: Event) {
        if let Err(e) = self.publish(event) {
            log::debug!("Event delivery incomplete: {}", e);
        }
    }
}
