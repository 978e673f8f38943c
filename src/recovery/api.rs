//! Public API for fault recovery

pub use crate::recovery::context::{RecoveryContext, RecoveryResult};
pub use crate::recovery::fault::{Fault, FaultKind};
pub use crate::recovery::manager::RecoveryManager;
pub use crate::recovery::strategies::{ConnectionRecoveryStrategy, NetworkRecoveryStrategy};
pub use crate::recovery::strategy::{recovery_operation, RecoveryOperation, RecoveryStrategy};
