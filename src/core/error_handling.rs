//! Error reporting for fatal errors
//!
//! Errors implementing [`ContextualError`] decide whether the user sees their
//! own message (configuration mistakes, bad endpoints) or only the operation
//! that failed (I/O and other system errors, with detail at debug level).

/// Errors that can tell user-actionable failures from system failures
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`; otherwise it should return `None`.
pub trait ContextualError: std::error::Error {
    fn is_user_actionable(&self) -> bool;

    fn user_message(&self) -> Option<&str>;
}

/// The primary line logged for a fatal error
pub fn fatal_message<E: ContextualError>(error: &E, operation_context: &str) -> String {
    match error.user_message() {
        Some(message) if error.is_user_actionable() => format!("FATAL: {}", message),
        _ => format!("FATAL: {}", operation_context),
    }
}

/// Log a fatal error, with its full detail at debug level
///
/// ```rust,no_run
/// use outflow::core::error_handling::log_error_with_context;
/// use outflow::queue::QueueError;
///
/// let err = QueueError::InvalidConfig {
///     message: "max_capacity must be greater than 0".to_string(),
/// };
/// log_error_with_context(&err, "Starting pipeline");
/// // Logs: "FATAL: max_capacity must be greater than 0"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    log::error!("{}", fatal_message(error, operation_context));
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
