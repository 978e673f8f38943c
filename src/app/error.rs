//! Application errors

use crate::core::error_handling::ContextualError;
use crate::notifications::api::NotificationError;
use crate::processor::api::ProcessorError;
use crate::queue::QueueError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration file does not exist: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Error reading configuration file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing configuration file {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("Failed to initialise logging: {message}")]
    Logging { message: String },

    #[error("Failed to read input: {0}")]
    Input(#[from] std::io::Error),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error("Failed to render statistics: {0}")]
    Render(#[from] serde_json::Error),
}

impl ContextualError for AppError {
    fn is_user_actionable(&self) -> bool {
        match self {
            AppError::ConfigNotFound { .. }
            | AppError::ConfigParse { .. }
            | AppError::Logging { .. } => true,
            AppError::Queue(e) => e.is_user_actionable(),
            AppError::Processor(e) => e.is_user_actionable(),
            _ => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            AppError::ConfigParse { message, .. } | AppError::Logging { message } => Some(message),
            AppError::ConfigNotFound { .. } => Some("the specified configuration file does not exist"),
            AppError::Queue(e) => e.user_message(),
            AppError::Processor(e) => e.user_message(),
            _ => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
