//! Retry Scenario Tests - bounded attempts within a single strategy

#[cfg(test)]
mod tests {
    use crate::notifications::api::{
        Event, EventFilter, NotificationManager, RecoveryEventType,
    };
    use crate::recovery::api::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    /// Strategy that fails a fixed number of times before succeeding
    struct ScriptedStrategy {
        failures_before_success: u32,
        max_attempts: u32,
        calls: AtomicU32,
    }

    impl ScriptedStrategy {
        fn new(failures_before_success: u32, max_attempts: u32) -> Self {
            Self {
                failures_before_success,
                max_attempts,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecoveryStrategy<String> for ScriptedStrategy {
        fn name(&self) -> &str {
            "scripted"
        }

        fn max_attempts(&self) -> u32 {
            self.max_attempts
        }

        fn can_handle(&self, _fault: &Fault) -> bool {
            true
        }

        async fn attempt_recovery(
            &self,
            _fault: &Fault,
            context: &RecoveryContext,
        ) -> Result<RecoveryResult<String>, Fault> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            assert_eq!(context.attempt, call);
            if call <= self.failures_before_success {
                Err(Fault::new(
                    FaultKind::ConnectionLost,
                    format!("still down (call {})", call),
                ))
            } else {
                Ok(RecoveryResult::succeeded(
                    "reconnected".to_string(),
                    "scripted",
                    context.elapsed,
                ))
            }
        }
    }

    fn fault() -> Fault {
        Fault::new(FaultKind::ConnectionLost, "port reset")
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let strategy = Arc::new(ScriptedStrategy::new(2, 3));
        let manager = RecoveryManager::<String>::new().with_strategy(strategy.clone());

        let result = manager.attempt_recovery(fault(), "open_port").await;

        assert!(result.success);
        assert_eq!(result.value.as_deref(), Some("reconnected"));
        assert_eq!(result.strategy.as_deref(), Some("scripted"));
        assert_eq!(result.fault, Some(fault()));
        assert_eq!(strategy.calls(), 3);
        println!("✓ Recovery succeeded after exactly 3 invocations");
    }

    #[tokio::test]
    async fn test_always_failing_strategy_exhausts_attempts() {
        let strategy = Arc::new(ScriptedStrategy::new(u32::MAX, 3));
        let manager = RecoveryManager::<String>::new().with_strategy(strategy.clone());

        let result = manager.attempt_recovery(fault(), "open_port").await;

        assert!(!result.success);
        assert!(result.value.is_none());
        assert_eq!(strategy.calls(), 3);
        let message = result.error_message.unwrap();
        assert!(message.contains("exhausted"), "{}", message);
        assert_eq!(
            message,
            "All recovery strategies failed: strategy 'scripted' exhausted 3 attempts"
        );
        // Last fault raised by an attempt is carried on the result
        assert_eq!(result.fault.unwrap().message, "still down (call 3)");
        println!("✓ Always-failing strategy stopped after max attempts");
    }

    #[tokio::test]
    async fn test_zero_attempts_never_invokes_strategy() {
        let strategy = Arc::new(ScriptedStrategy::new(0, 0));
        let manager = RecoveryManager::<String>::new().with_strategy(strategy.clone());

        let result = manager.attempt_recovery(fault(), "open_port").await;

        assert!(!result.success);
        assert_eq!(strategy.calls(), 0);
    }

    #[tokio::test]
    async fn test_recovery_events_published() {
        let notifier = Arc::new(NotificationManager::new());
        let mut receiver = notifier
            .subscribe(
                "recovery-test".to_string(),
                EventFilter::RecoveryOnly,
                "test:recovery".to_string(),
            )
            .unwrap();
        let manager = RecoveryManager::<String>::with_notifications(notifier.clone())
            .with_strategy(Arc::new(ScriptedStrategy::new(1, 3)));

        let result = manager.attempt_recovery(fault(), "open_port").await;
        assert!(result.success);

        let mut kinds = Vec::new();
        while let Ok(Event::Recovery(event)) = receiver.try_recv() {
            assert_eq!(event.operation, "open_port");
            kinds.push(event.event_type);
        }
        assert_eq!(
            kinds,
            vec![
                RecoveryEventType::Attempting,
                RecoveryEventType::Attempting,
                RecoveryEventType::Succeeded,
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_chain_fails_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let strategy = ConnectionRecoveryStrategy::new(recovery_operation(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));
        let manager = RecoveryManager::<()>::new().with_strategy(Arc::new(strategy));

        let token = CancellationToken::new();
        token.cancel();
        let result = manager
            .attempt_recovery_with_token(fault(), "open_port", token)
            .await;

        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("cancelled"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_strategy_recovers_server_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let strategy = NetworkRecoveryStrategy::new(recovery_operation(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Fault::from_status(503, "still unavailable"))
                } else {
                    Ok(204u16)
                }
            }
        }));
        let manager = RecoveryManager::<u16>::new().with_strategy(Arc::new(strategy));

        let result = manager
            .attempt_recovery(Fault::from_status(503, "unavailable"), "post_batch")
            .await;

        assert!(result.success);
        assert_eq!(result.value, Some(204));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(result.elapsed >= std::time::Duration::from_secs(60));
    }
}
