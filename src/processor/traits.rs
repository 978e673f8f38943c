//! Delivery processor trait

use crate::processor::result::{BatchProcessingResult, ProcessingResult};
use crate::queue::message::QueuedMessage;
use async_trait::async_trait;
use tokio::time::Instant;

/// Performs the side-effecting delivery of queued payloads
///
/// Processors only see messages by reference; the queue owns status, retry
/// and timing fields and updates them from the returned results.
#[async_trait]
pub trait DeliveryProcessor<T>: Send + Sync
where
    T: Send + Sync,
{
    fn name(&self) -> &str;

    /// Whether the manager should hand this processor whole batches
    fn supports_batch(&self) -> bool {
        false
    }

    /// Messages rejected here are dead-lettered without a delivery attempt
    fn can_process(&self, _message: &QueuedMessage<T>) -> bool {
        true
    }

    async fn process(&self, message: &QueuedMessage<T>) -> ProcessingResult;

    /// Deliver a batch; by default each message is processed in turn
    async fn process_batch(&self, messages: &[QueuedMessage<T>]) -> BatchProcessingResult {
        let started = Instant::now();
        let mut results = Vec::with_capacity(messages.len());
        for message in messages {
            results.push((message.id(), self.process(message).await));
        }
        BatchProcessingResult {
            results,
            total_elapsed: started.elapsed(),
        }
    }
}
