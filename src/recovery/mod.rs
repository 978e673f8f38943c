//! Fault recovery
//!
//! Infrastructure faults raised outside the delivery result channel (a lost
//! connection, a throttled endpoint) are classified into a [`Fault`] and
//! handed to a [`RecoveryManager`]. The manager picks the first registered
//! strategy that claims the fault and drives it for a bounded number of
//! delayed attempts.
//!
//! ```rust,no_run
//! use outflow::recovery::api::*;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let manager = RecoveryManager::<()>::new().with_strategy(Arc::new(
//!     NetworkRecoveryStrategy::new(recovery_operation(|| async { Ok::<_, Fault>(()) })),
//! ));
//! let result = manager
//!     .attempt_recovery(Fault::from_status(503, "unavailable"), "post_batch")
//!     .await;
//! assert!(result.success);
//! # }
//! ```
//!
//! [`Fault`]: api::Fault
//! [`RecoveryManager`]: api::RecoveryManager

pub(crate) mod context;
pub(crate) mod fault;
pub(crate) mod manager;
pub(crate) mod strategies;
pub(crate) mod strategy;

pub mod api;

#[cfg(test)]
mod tests;
