//! Reconnect after a lost or refused connection

use crate::recovery::context::{RecoveryContext, RecoveryResult};
use crate::recovery::fault::{Fault, FaultKind};
use crate::recovery::strategy::{delayed_attempt, RecoveryOperation, RecoveryStrategy};
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// Delay used when the resource is held by someone else
pub const DEFAULT_BUSY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECTION_ATTEMPTS: u32 = 3;

/// Handles access, lookup, I/O and connection-loss faults by waiting and
/// invoking an injected reconnect operation
pub struct ConnectionRecoveryStrategy<T> {
    reconnect: RecoveryOperation<T>,
    reconnect_delay: Duration,
    busy_delay: Duration,
    max_attempts: u32,
}

impl<T> ConnectionRecoveryStrategy<T> {
    pub fn new(reconnect: RecoveryOperation<T>) -> Self {
        Self {
            reconnect,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            busy_delay: DEFAULT_BUSY_DELAY,
            max_attempts: DEFAULT_CONNECTION_ATTEMPTS,
        }
    }

    pub fn with_delays(mut self, reconnect_delay: Duration, busy_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self.busy_delay = busy_delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn delay_for(&self, fault: &Fault) -> Duration {
        match fault.kind {
            FaultKind::AccessDenied => self.busy_delay,
            _ => self.reconnect_delay,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> RecoveryStrategy<T> for ConnectionRecoveryStrategy<T> {
    fn name(&self) -> &str {
        "connection"
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn can_handle(&self, fault: &Fault) -> bool {
        matches!(
            fault.kind,
            FaultKind::AccessDenied | FaultKind::NotFound | FaultKind::Io | FaultKind::ConnectionLost
        )
    }

    async fn attempt_recovery(
        &self,
        fault: &Fault,
        context: &RecoveryContext,
    ) -> Result<RecoveryResult<T>, Fault> {
        delayed_attempt(self.name(), self.delay_for(fault), &self.reconnect, context).await
    }
}
