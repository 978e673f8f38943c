//! Bounded Outbound Queues
//!
//! Named, bounded queues of typed messages awaiting delivery, plus the manager
//! that binds each queue to a delivery processor and runs its worker loops.
//!
//! # Overview
//!
//! - **Bounded**: enqueue beyond `max_capacity` is rejected, never blocks
//! - **Priority**: optional priority ordering, FIFO among equal priorities
//! - **Retries**: retryable failures are re-admitted after exponential backoff
//! - **Dead letters**: exhausted or permanently failed messages are parked
//! - **Event Integration**: lifecycle events via the notification system
//!
//! # Message Lifecycle
//!
//! ```text
//!   enqueue ──► Queued ──dequeue──► Processing ──success──► Completed
//!                 ▲                     │
//!                 │ backoff             │ failure
//!                 │                     ▼
//!                 └──── retryable ◄─── Failed ──exhausted/permanent──► DeadLettered
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use outflow::queue::api::*;
//!
//! # fn example() -> QueueResult<()> {
//! let queue = BoundedQueue::<String>::new(QueueConfig::named("outbound"))?;
//! queue.try_enqueue(QueuedMessage::new("reading".to_string()))?;
//! assert_eq!(queue.len(), 1);
//! # Ok(())
//! # }
//! ```

pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod health;
pub(crate) mod internal;
pub(crate) mod manager;
pub(crate) mod message;
pub(crate) mod stats;

pub mod api;

pub use error::{QueueError, QueueResult};
pub use manager::QueueManager;

#[cfg(test)]
mod tests;
