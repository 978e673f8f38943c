//! Back off and retry after network-level faults

use crate::recovery::context::{RecoveryContext, RecoveryResult};
use crate::recovery::fault::{Fault, FaultKind};
use crate::recovery::strategy::{delayed_attempt, RecoveryOperation, RecoveryStrategy};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_NETWORK_ATTEMPTS: u32 = 3;

fn default_delays() -> HashMap<FaultKind, Duration> {
    HashMap::from([
        (FaultKind::RateLimited, Duration::from_secs(60)),
        (FaultKind::ServerError, Duration::from_secs(30)),
        (FaultKind::Transport, Duration::from_secs(15)),
        (FaultKind::Timeout, Duration::from_millis(500)),
    ])
}

/// Handles rate limiting, server errors, transport errors and timeouts with a
/// per-kind delay before invoking an injected retry operation
pub struct NetworkRecoveryStrategy<T> {
    retry: RecoveryOperation<T>,
    delays: HashMap<FaultKind, Duration>,
    max_attempts: u32,
}

impl<T> NetworkRecoveryStrategy<T> {
    pub fn new(retry: RecoveryOperation<T>) -> Self {
        Self {
            retry,
            delays: default_delays(),
            max_attempts: DEFAULT_NETWORK_ATTEMPTS,
        }
    }

    /// Override the delay for one of the handled fault kinds
    pub fn with_delay(mut self, kind: FaultKind, delay: Duration) -> Self {
        if let Some(existing) = self.delays.get_mut(&kind) {
            *existing = delay;
        }
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn delay_for(&self, fault: &Fault) -> Option<Duration> {
        self.delays.get(&fault.kind).copied()
    }
}

#[async_trait]
impl<T: Send + 'static> RecoveryStrategy<T> for NetworkRecoveryStrategy<T> {
    fn name(&self) -> &str {
        "network"
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn can_handle(&self, fault: &Fault) -> bool {
        self.delays.contains_key(&fault.kind)
    }

    async fn attempt_recovery(
        &self,
        fault: &Fault,
        context: &RecoveryContext,
    ) -> Result<RecoveryResult<T>, Fault> {
        let delay = self.delay_for(fault).ok_or_else(|| fault.clone())?;
        delayed_attempt(self.name(), delay, &self.retry, context).await
    }
}
