//! Delivery outcome types

use crate::queue::message::MessageId;
use std::time::Duration;

/// Outcome of delivering a single message
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    pub success: bool,
    pub elapsed: Duration,
    pub error_message: Option<String>,
    /// Only meaningful when `success` is false
    pub should_retry: bool,
}

impl ProcessingResult {
    pub fn success(elapsed: Duration) -> Self {
        Self {
            success: true,
            elapsed,
            error_message: None,
            should_retry: false,
        }
    }

    pub fn retryable_failure(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            elapsed,
            error_message: Some(error.into()),
            should_retry: true,
        }
    }

    pub fn permanent_failure(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            elapsed,
            error_message: Some(error.into()),
            should_retry: false,
        }
    }

    pub fn error_text(&self) -> &str {
        self.error_message.as_deref().unwrap_or("unknown delivery error")
    }
}

/// Per-message outcomes of a batch delivery
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchProcessingResult {
    pub results: Vec<(MessageId, ProcessingResult)>,
    pub total_elapsed: Duration,
}

impl BatchProcessingResult {
    /// Apply one outcome to every message in the batch
    pub fn uniform<'a>(
        ids: impl IntoIterator<Item = &'a MessageId>,
        result: ProcessingResult,
    ) -> Self {
        let total_elapsed = result.elapsed;
        Self {
            results: ids.into_iter().map(|id| (*id, result.clone())).collect(),
            total_elapsed,
        }
    }

    pub fn result_for(&self, id: MessageId) -> Option<&ProcessingResult> {
        self.results
            .iter()
            .find(|(result_id, _)| *result_id == id)
            .map(|(_, result)| result)
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.success).count()
    }
}
