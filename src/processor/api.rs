//! Public API for delivery processors

pub use crate::processor::error::{ProcessorError, ProcessorResult};
pub use crate::processor::http::{is_retryable_status, HttpDeliveryConfig, HttpDeliveryProcessor};
pub use crate::processor::result::{BatchProcessingResult, ProcessingResult};
pub use crate::processor::traits::DeliveryProcessor;
