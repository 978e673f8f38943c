//! Event Flow Tests - events from queues reaching filtered subscribers

#[cfg(test)]
mod tests {
    use crate::notifications::api::*;
    use crate::queue::api::{BoundedQueue, QueueConfig, QueuedMessage};
    use std::sync::Arc;
    use std::thread;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_subscribers_see_only_filtered_kinds() {
        let notifier = Arc::new(NotificationManager::new());
        let mut queue_and_system = notifier
            .subscribe(
                "monitor".to_string(),
                EventFilter::QueueAndSystem,
                "test:monitor".to_string(),
            )
            .unwrap();
        let mut recovery_only = notifier
            .subscribe(
                "recovery".to_string(),
                EventFilter::RecoveryOnly,
                "test:recovery".to_string(),
            )
            .unwrap();

        let queue =
            BoundedQueue::<u32>::with_notifications(QueueConfig::named("flow"), notifier.clone())
                .unwrap();
        queue.enqueue(QueuedMessage::new(1));
        queue.dequeue(&CancellationToken::new());
        notifier.publish_or_log(Event::System(SystemEvent::with_message(
            SystemEventType::Shutdown,
            "input closed".to_string(),
        )));

        let mut kinds = Vec::new();
        while let Ok(event) = queue_and_system.try_recv() {
            kinds.push(event.kind());
        }
        assert_eq!(kinds, vec!["Queue", "Queue", "System"]);
        assert!(recovery_only.try_recv().is_err());
        assert_eq!(notifier.events_sent("monitor"), Some(3));
        assert_eq!(notifier.events_sent("recovery"), Some(0));
        println!("✓ Filters route queue, system and recovery events");
    }

    #[test]
    fn test_dropped_subscriber_does_not_break_queue() {
        let notifier = Arc::new(NotificationManager::new());
        let receiver = notifier
            .subscribe("short-lived".to_string(), EventFilter::All, "test".to_string())
            .unwrap();
        drop(receiver);

        let queue =
            BoundedQueue::<u32>::with_notifications(QueueConfig::named("resilient"), notifier.clone())
                .unwrap();

        assert!(queue.enqueue(QueuedMessage::new(1)));
        assert!(queue.enqueue(QueuedMessage::new(2)));
        assert_eq!(queue.len(), 2);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_concurrent_publishers() {
        let notifier = Arc::new(NotificationManager::new());
        let mut receiver = notifier
            .subscribe("all".to_string(), EventFilter::All, "test".to_string())
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|n| {
                let notifier = notifier.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        notifier
                            .publish(Event::Queue(QueueEvent::new(
                                QueueEventType::Enqueued,
                                format!("queue-{}", n),
                            )))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut received = 0;
        while receiver.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 100);
        assert_eq!(notifier.events_sent("all"), Some(100));
    }
}
