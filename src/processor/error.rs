//! Processor construction errors

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProcessorError {
    #[error("Invalid delivery endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Failed to create HTTP client: {message}")]
    ClientBuild { message: String },
}

impl crate::core::error_handling::ContextualError for ProcessorError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ProcessorError::InvalidEndpoint { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ProcessorError::InvalidEndpoint { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;
