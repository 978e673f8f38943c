//! RecoveryManager implementation

use crate::notifications::api::{Event, NotificationManager, RecoveryEvent, RecoveryEventType};
use crate::recovery::context::{RecoveryContext, RecoveryResult};
use crate::recovery::fault::Fault;
use crate::recovery::strategy::RecoveryStrategy;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Ordered registry of recovery strategies
///
/// The first registered strategy whose `can_handle` accepts a fault is the
/// only one used for it; later strategies are not consulted even if it gives up.
pub struct RecoveryManager<T> {
    strategies: Vec<Arc<dyn RecoveryStrategy<T>>>,
    notifier: Option<Arc<NotificationManager>>,
}

impl<T: Send> Default for RecoveryManager<T> {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
            notifier: None,
        }
    }
}

impl<T: Send + 'static> RecoveryManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifications(notifier: Arc<NotificationManager>) -> Self {
        Self {
            strategies: Vec::new(),
            notifier: Some(notifier),
        }
    }

    pub fn register(&mut self, strategy: Arc<dyn RecoveryStrategy<T>>) {
        log::debug!("Registered recovery strategy '{}'", strategy.name());
        self.strategies.push(strategy);
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn RecoveryStrategy<T>>) -> Self {
        self.register(strategy);
        self
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    fn emit(&self, event: RecoveryEvent) {
        if let Some(notifier) = &self.notifier {
            notifier.publish_or_log(Event::Recovery(event));
        }
    }

    pub async fn attempt_recovery(&self, fault: Fault, operation_name: &str) -> RecoveryResult<T> {
        self.attempt_recovery_with_token(fault, operation_name, CancellationToken::new())
            .await
    }

    /// Drive the first applicable strategy until it succeeds, is cancelled or
    /// runs out of attempts
    pub async fn attempt_recovery_with_token(
        &self,
        fault: Fault,
        operation_name: &str,
        cancel: CancellationToken,
    ) -> RecoveryResult<T> {
        let mut context = RecoveryContext::new(operation_name, cancel);
        context.last_fault = Some(fault.clone());

        let Some(strategy) = self.strategies.iter().find(|s| s.can_handle(&fault)) else {
            log::warn!(
                "No recovery strategy for {} in operation '{}'",
                fault,
                operation_name
            );
            self.emit(
                RecoveryEvent::new(RecoveryEventType::Failed, operation_name, None, 0)
                    .with_message(fault.to_string()),
            );
            return RecoveryResult::failed(
                format!(
                    "No applicable recovery strategy for {} in operation '{}'",
                    fault, operation_name
                ),
                Some(fault),
                context.started().elapsed(),
            );
        };

        let name = strategy.name();
        let max_attempts = strategy.max_attempts();

        for attempt in 1..=max_attempts {
            context.begin_attempt(attempt);
            self.emit(RecoveryEvent::new(
                RecoveryEventType::Attempting,
                operation_name,
                Some(name),
                attempt,
            ));

            match strategy.attempt_recovery(&fault, &context).await {
                Ok(mut result) if result.success => {
                    log::info!(
                        "Recovered '{}' with strategy '{}' on attempt {}/{}",
                        operation_name,
                        name,
                        attempt,
                        max_attempts
                    );
                    self.emit(RecoveryEvent::new(
                        RecoveryEventType::Succeeded,
                        operation_name,
                        Some(name),
                        attempt,
                    ));
                    result.fault = Some(fault);
                    result.elapsed = context.started().elapsed();
                    return result.with_strategy(name);
                }
                Ok(result) => {
                    if context.cancel.is_cancelled() {
                        log::info!("Recovery of '{}' cancelled", operation_name);
                        self.emit(
                            RecoveryEvent::new(
                                RecoveryEventType::Failed,
                                operation_name,
                                Some(name),
                                attempt,
                            )
                            .with_message("cancelled"),
                        );
                        return result.with_strategy(name);
                    }
                    if let Some(last) = result.fault {
                        context.last_fault = Some(last);
                    }
                }
                Err(attempt_fault) => {
                    log::warn!(
                        "Recovery strategy '{}' attempt {}/{} for '{}' failed: {}",
                        name,
                        attempt,
                        max_attempts,
                        operation_name,
                        attempt_fault
                    );
                    context.last_fault = Some(attempt_fault);
                }
            }
        }

        let message = format!(
            "All recovery strategies failed: strategy '{}' exhausted {} attempts",
            name, max_attempts
        );
        log::error!("{} for '{}'", message, operation_name);
        self.emit(
            RecoveryEvent::new(
                RecoveryEventType::Failed,
                operation_name,
                Some(name),
                max_attempts,
            )
            .with_message(message.clone()),
        );
        let elapsed = context.started().elapsed();
        RecoveryResult::failed(message, context.last_fault, elapsed).with_strategy(name)
    }
}
