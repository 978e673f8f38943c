//! Event types for the notification system

use crate::queue::message::MessageId;
use std::time::SystemTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueEventType {
    Enqueued,
    Dequeued,
    Requeued,
    DeadLettered,
    Completed,
    Failed,
    Cleared,
    ProcessingStarted,
    ProcessingStopped,
    Shutdown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryEventType {
    Attempting,
    Succeeded,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemEventType {
    Startup,
    Shutdown,
    ForceShutdown,
    ShutdownTimeout,
}

#[derive(Clone, Debug)]
pub struct QueueEvent {
    pub event_type: QueueEventType,
    pub timestamp: SystemTime,
    pub queue_name: String,
    pub message_id: Option<MessageId>,
    pub size: Option<usize>,
    pub message: Option<String>,
}

impl QueueEvent {
    pub fn new(event_type: QueueEventType, queue_name: impl Into<String>) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            queue_name: queue_name.into(),
            message_id: None,
            size: None,
            message: None,
        }
    }

    pub fn for_message(
        event_type: QueueEventType,
        queue_name: impl Into<String>,
        message_id: MessageId,
        size: usize,
    ) -> Self {
        Self {
            message_id: Some(message_id),
            size: Some(size),
            ..Self::new(event_type, queue_name)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}

#[derive(Clone, Debug)]
pub struct RecoveryEvent {
    pub event_type: RecoveryEventType,
    pub timestamp: SystemTime,
    pub operation: String,
    pub strategy: Option<String>,
    pub attempt: u32,
    pub message: Option<String>,
}

impl RecoveryEvent {
    pub fn new(
        event_type: RecoveryEventType,
        operation: impl Into<String>,
        strategy: Option<&str>,
        attempt: u32,
    ) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            operation: operation.into(),
            strategy: strategy.map(str::to_string),
            attempt,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct SystemEvent {
    pub event_type: SystemEventType,
    pub timestamp: SystemTime,
    pub message: Option<String>,
}

impl SystemEvent {
    pub fn new(event_type: SystemEventType) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            message: None,
        }
    }

    pub fn with_message(event_type: SystemEventType, message: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            message: Some(message),
        }
    }
}

/// Unified event enum that encompasses all event types
#[derive(Clone, Debug)]
pub enum Event {
    Queue(QueueEvent),
    Recovery(RecoveryEvent),
    System(SystemEvent),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Queue(_) => "Queue",
            Event::Recovery(_) => "Recovery",
            Event::System(_) => "System",
        }
    }
}

/// Event filtering options for subscribers
#[derive(Clone, Debug, PartialEq)]
pub enum EventFilter {
    QueueOnly,
    RecoveryOnly,
    SystemOnly,
    QueueAndSystem,
    All,
}

impl EventFilter {
    /// Check if an event should be accepted by this filter
    pub fn accepts(&self, event: &Event) -> bool {
        matches!(
            (self, event),
            (EventFilter::QueueOnly, Event::Queue(_))
                | (EventFilter::RecoveryOnly, Event::Recovery(_))
                | (EventFilter::SystemOnly, Event::System(_))
                | (EventFilter::QueueAndSystem, Event::Queue(_))
                | (EventFilter::QueueAndSystem, Event::System(_))
                | (EventFilter::All, _)
        )
    }
}
