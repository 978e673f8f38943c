//! Public API for the queue system
//!
//! External modules should import from here rather than directly from internal modules.

// Core queue components
pub use crate::queue::internal::{BoundedQueue, RequeueOutcome};
pub use crate::queue::manager::QueueManager;

// Configuration
pub use crate::queue::config::{ManagerConfig, QueueConfig};

// Message types
pub use crate::queue::message::{MessageId, MessageStatus, QueuedMessage, LAST_ERROR_KEY};

// Error handling
pub use crate::queue::error::{QueueError, QueueResult};

// Statistics and health
pub use crate::queue::health::{HealthStatus, QueueHealth, FAILURE_RATE_CRITICAL, FAILURE_RATE_WARNING};
pub use crate::queue::stats::{QueueStatistics, ROLLING_WINDOW};
