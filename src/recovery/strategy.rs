//! Recovery strategy trait and shared helpers

use crate::recovery::context::{RecoveryContext, RecoveryResult};
use crate::recovery::fault::Fault;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Operation a strategy re-runs after its delay (reconnect, resend, ...)
pub type RecoveryOperation<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, Fault>> + Send + Sync>;

/// Wrap an async closure as a [`RecoveryOperation`]
pub fn recovery_operation<T, F, Fut>(operation: F) -> RecoveryOperation<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, Fault>> + Send + 'static,
{
    Arc::new(move || operation().boxed())
}

/// Fault-class specific remediation policy
///
/// `attempt_recovery` returns `Err` when the attempt itself failed (the
/// re-run operation raised another fault); the manager logs it and keeps
/// going until `max_attempts` is spent.
#[async_trait]
pub trait RecoveryStrategy<T: Send>: Send + Sync {
    fn name(&self) -> &str;

    fn max_attempts(&self) -> u32;

    fn can_handle(&self, fault: &Fault) -> bool;

    async fn attempt_recovery(
        &self,
        fault: &Fault,
        context: &RecoveryContext,
    ) -> Result<RecoveryResult<T>, Fault>;
}

/// Sleep for `delay` unless `cancel` fires first; `false` means cancelled
pub(crate) async fn wait_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Shared attempt body: wait, then run the operation
pub(crate) async fn delayed_attempt<T: Send>(
    strategy: &str,
    delay: Duration,
    operation: &RecoveryOperation<T>,
    context: &RecoveryContext,
) -> Result<RecoveryResult<T>, Fault> {
    log::debug!(
        "Recovery strategy '{}' waiting {:?} before attempt {} of '{}'",
        strategy,
        delay,
        context.attempt,
        context.operation_name
    );

    if !wait_or_cancel(delay, &context.cancel).await {
        return Ok(RecoveryResult::failed(
            format!("Recovery of '{}' cancelled", context.operation_name),
            context.last_fault.clone(),
            context.started().elapsed(),
        )
        .with_strategy(strategy));
    }

    let value = operation().await?;
    Ok(RecoveryResult::succeeded(
        value,
        strategy,
        context.started().elapsed(),
    ))
}
