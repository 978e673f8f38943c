//! Recovery context and result types

use crate::recovery::fault::Fault;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// State handed to a strategy on every recovery attempt
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    pub operation_name: String,
    /// 1-based attempt number within the current strategy
    pub attempt: u32,
    pub elapsed: Duration,
    pub last_fault: Option<Fault>,
    pub properties: HashMap<String, String>,
    pub cancel: CancellationToken,
    started: Instant,
}

impl RecoveryContext {
    pub fn new(operation_name: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            operation_name: operation_name.into(),
            attempt: 0,
            elapsed: Duration::ZERO,
            last_fault: None,
            properties: HashMap::new(),
            cancel,
            started: Instant::now(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub(crate) fn begin_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
        self.elapsed = self.started.elapsed();
    }

    pub(crate) fn started(&self) -> Instant {
        self.started
    }
}

/// Outcome of a recovery attempt or chain
#[derive(Debug, Clone)]
pub struct RecoveryResult<T> {
    pub success: bool,
    pub value: Option<T>,
    pub error_message: Option<String>,
    /// Fault that triggered recovery
    pub fault: Option<Fault>,
    pub elapsed: Duration,
    /// Strategy that produced this result, if any was selected
    pub strategy: Option<String>,
}

impl<T> RecoveryResult<T> {
    pub fn succeeded(value: T, strategy: &str, elapsed: Duration) -> Self {
        Self {
            success: true,
            value: Some(value),
            error_message: None,
            fault: None,
            elapsed,
            strategy: Some(strategy.to_string()),
        }
    }

    pub fn failed(error_message: impl Into<String>, fault: Option<Fault>, elapsed: Duration) -> Self {
        Self {
            success: false,
            value: None,
            error_message: Some(error_message.into()),
            fault,
            elapsed,
            strategy: None,
        }
    }

    pub fn with_strategy(mut self, strategy: &str) -> Self {
        self.strategy = Some(strategy.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::fault::FaultKind;

    #[test]
    fn test_context_tracks_attempts() {
        let mut context = RecoveryContext::new("open_port", CancellationToken::new())
            .with_property("port", "COM3");
        assert_eq!(context.attempt, 0);

        context.begin_attempt(2);
        assert_eq!(context.attempt, 2);
        assert_eq!(context.properties.get("port").map(String::as_str), Some("COM3"));
    }

    #[test]
    fn test_result_constructors() {
        let ok = RecoveryResult::succeeded(5, "network", Duration::from_millis(3));
        assert!(ok.success);
        assert_eq!(ok.value, Some(5));
        assert_eq!(ok.strategy.as_deref(), Some("network"));

        let fault = Fault::new(FaultKind::Timeout, "slow");
        let failed: RecoveryResult<i32> =
            RecoveryResult::failed("gave up", Some(fault.clone()), Duration::ZERO)
                .with_strategy("network");
        assert!(!failed.success);
        assert_eq!(failed.fault, Some(fault));
        assert_eq!(failed.error_message.as_deref(), Some("gave up"));
    }
}
