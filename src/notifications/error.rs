//! Error types for the notification system

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotificationError {
    #[error("Channel closed for subscriber: {0}")]
    ChannelClosed(String),

    #[error("Failed to publish {event_type} event to {} subscribers: {failed_subscribers:?}", failed_subscribers.len())]
    PublishFailed {
        event_type: String,
        failed_subscribers: Vec<String>,
    },

    #[error("Internal notification error: {message}")]
    Internal { message: String },
}

impl crate::core::error_handling::ContextualError for NotificationError {
    fn is_user_actionable(&self) -> bool {
        false // All notification errors are system-level
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type NotificationResult<T> = Result<T, NotificationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_failed_display() {
        let err = NotificationError::PublishFailed {
            event_type: "Queue".to_string(),
            failed_subscribers: vec!["a".to_string(), "b".to_string()],
        };
        let text = err.to_string();
        assert!(text.starts_with("Failed to publish Queue event to 2 subscribers"));
    }
}
