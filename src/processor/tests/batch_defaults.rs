//! Default Batch Tests - sequential fallback of `process_batch`

#[cfg(test)]
mod tests {
    use crate::processor::api::*;
    use crate::queue::api::QueuedMessage;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fails payloads that are odd numbers, recording call order
    struct EvenOnly {
        seen: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl DeliveryProcessor<u32> for EvenOnly {
        fn name(&self) -> &str {
            "even-only"
        }

        async fn process(&self, message: &QueuedMessage<u32>) -> ProcessingResult {
            self.seen.lock().unwrap().push(message.payload);
            if message.payload % 2 == 0 {
                ProcessingResult::success(Duration::from_millis(1))
            } else {
                ProcessingResult::retryable_failure("odd payload", Duration::from_millis(1))
            }
        }
    }

    #[tokio::test]
    async fn test_default_batch_processes_each_message_in_order() {
        let processor = EvenOnly {
            seen: Mutex::new(Vec::new()),
        };
        let messages: Vec<QueuedMessage<u32>> = (1..=4).map(QueuedMessage::new).collect();

        let batch = processor.process_batch(&messages).await;

        assert_eq!(*processor.seen.lock().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(batch.results.len(), 4);
        assert_eq!(batch.success_count(), 2);
        for message in &messages {
            let result = batch.result_for(message.id()).unwrap();
            assert_eq!(result.success, message.payload % 2 == 0);
        }
        println!("✓ Default process_batch delegates to process sequentially");
    }

    #[test]
    fn test_trait_defaults() {
        let processor = EvenOnly {
            seen: Mutex::new(Vec::new()),
        };
        assert!(!processor.supports_batch());
        assert!(processor.can_process(&QueuedMessage::new(7)));
    }
}
