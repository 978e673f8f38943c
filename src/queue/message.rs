//! Message envelope for the delivery queue
//!
//! A [`QueuedMessage`] wraps a payload with the identity, timing, retry,
//! priority and status metadata the queue needs to move it through its
//! lifecycle. The payload itself is opaque to the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use strum_macros::{Display, EnumIter};
use uuid::Uuid;

/// Metadata key holding the text of the most recent failure
pub const LAST_ERROR_KEY: &str = "last_error";

/// Unique identifier assigned to a message when it is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a queued message
///
/// ```text
/// Queued -> Processing -> Completed
///                      -> Failed -> Queued (requeue)
///                                -> DeadLetter
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum MessageStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    DeadLetter,
}

impl MessageStatus {
    /// Completed and DeadLetter end the automatic lifecycle
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Completed | MessageStatus::DeadLetter)
    }

    /// Whether the state machine allows moving from `self` to `next`
    ///
    /// `DeadLetter -> Queued` is only taken by an explicit redrive.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, DeadLetter)
                | (Failed, Queued)
                | (Failed, DeadLetter)
                | (DeadLetter, Queued)
        )
    }
}

/// Envelope carrying a payload through the queue
#[derive(Debug, Clone)]
pub struct QueuedMessage<T> {
    id: MessageId,
    pub payload: T,
    pub priority: i32,
    pub metadata: HashMap<String, String>,
    pub(crate) status: MessageStatus,
    pub(crate) retry_count: u32,
    pub(crate) enqueued_at: DateTime<Utc>,
    pub(crate) processing_started_at: Option<DateTime<Utc>>,
    pub(crate) last_attempt_at: Option<DateTime<Utc>>,
}

impl<T> QueuedMessage<T> {
    pub fn new(payload: T) -> Self {
        Self {
            id: MessageId::new(),
            payload,
            priority: 0,
            metadata: HashMap::new(),
            status: MessageStatus::Queued,
            retry_count: 0,
            enqueued_at: Utc::now(),
            processing_started_at: None,
            last_attempt_at: None,
        }
    }

    pub fn with_priority(payload: T, priority: i32) -> Self {
        let mut message = Self::new(payload);
        message.priority = priority;
        message
    }

    /// Attach a metadata entry (builder style)
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn status(&self) -> MessageStatus {
        self.status
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub fn processing_started_at(&self) -> Option<DateTime<Utc>> {
        self.processing_started_at
    }

    pub fn last_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.last_attempt_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.metadata.get(LAST_ERROR_KEY).map(String::as_str)
    }

    /// Record a failed delivery attempt on the envelope
    pub(crate) fn record_failure(&mut self, error: &str) {
        self.status = MessageStatus::Failed;
        self.metadata
            .insert(LAST_ERROR_KEY.to_string(), error.to_string());
    }

    pub(crate) fn mark_queued(&mut self) {
        self.status = MessageStatus::Queued;
        self.enqueued_at = Utc::now();
        self.processing_started_at = None;
    }

    pub(crate) fn mark_processing(&mut self) {
        let now = Utc::now();
        self.status = MessageStatus::Processing;
        self.processing_started_at = Some(now);
        self.last_attempt_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_new_message_defaults() {
        let message = QueuedMessage::new("payload".to_string());

        assert_eq!(message.status(), MessageStatus::Queued);
        assert_eq!(message.retry_count(), 0);
        assert_eq!(message.priority, 0);
        assert!(message.processing_started_at().is_none());
        assert!(message.last_attempt_at().is_none());
        assert!(message.metadata.is_empty());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = QueuedMessage::new(1);
        let b = QueuedMessage::new(1);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_with_priority_and_metadata() {
        let message = QueuedMessage::with_priority("p", 7).with_metadata("route", "alpha");
        assert_eq!(message.priority, 7);
        assert_eq!(message.metadata.get("route").map(String::as_str), Some("alpha"));
    }

    #[test]
    fn test_record_failure_sets_last_error() {
        let mut message = QueuedMessage::new(());
        message.mark_processing();
        message.record_failure("HTTP 503");

        assert_eq!(message.status(), MessageStatus::Failed);
        assert_eq!(message.last_error(), Some("HTTP 503"));
        assert!(message.last_attempt_at().is_some());
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<MessageStatus> =
            MessageStatus::iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![MessageStatus::Completed, MessageStatus::DeadLetter]
        );
    }

    #[test]
    fn test_completed_has_no_outgoing_transitions() {
        for next in MessageStatus::iter() {
            assert!(!MessageStatus::Completed.can_transition_to(next));
        }
    }

    #[test]
    fn test_state_machine_edges() {
        use MessageStatus::*;
        assert!(Queued.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Queued));
        assert!(Failed.can_transition_to(DeadLetter));
        assert!(!Queued.can_transition_to(Completed));
        assert!(!DeadLetter.can_transition_to(Processing));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(MessageStatus::DeadLetter.to_string(), "DeadLetter");
    }
}
