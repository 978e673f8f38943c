//! Public API for the notification system
//!
//! External modules should import from here rather than directly from internal modules.

pub use crate::notifications::error::{NotificationError, NotificationResult};
pub use crate::notifications::event::{
    Event, EventFilter, QueueEvent, QueueEventType, RecoveryEvent, RecoveryEventType, SystemEvent,
    SystemEventType,
};
pub use crate::notifications::manager::{EventReceiver, NotificationManager};
