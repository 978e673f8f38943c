//! Queue Error Types

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueueError {
    #[error("Queue '{queue_name}' is full (max capacity: {max_capacity})")]
    QueueFull {
        queue_name: String,
        max_capacity: usize,
    },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Queue already exists: {queue_name}")]
    QueueAlreadyExists { queue_name: String },

    #[error("Queue '{queue_name}' does not hold messages of type {expected}")]
    TypeMismatch {
        queue_name: String,
        expected: &'static str,
    },

    #[error("Invalid queue configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Internal queue error: {message}")]
    Internal { message: String },
}

impl crate::core::error_handling::ContextualError for QueueError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, QueueError::InvalidConfig { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            QueueError::InvalidConfig { message } => Some(message),
            _ => None,
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
