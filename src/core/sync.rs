//! Lock poisoning helpers
//!
//! Fallible paths convert a poisoned lock into their own error type with
//! [`handle_mutex_poison`]. Paths that cannot report an error (the queue's
//! `bool`-returning operations) use [`recover_poisoned`], which logs and
//! continues with the inner guard.

use std::sync::{LockResult, PoisonError};

/// Convert a poisoned lock result into an application error
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use outflow::core::sync::handle_mutex_poison;
/// use outflow::queue::QueueError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |message| QueueError::Internal { message })
///     .unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<G, E>(
    result: LockResult<G>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<G, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (lock poisoned). This indicates a panic occurred while holding a lock. PoisonError: {:?}",
            poison_err
        ))
    })
}

/// Take the guard from a possibly poisoned lock, logging the poisoning
pub fn recover_poisoned<G>(result: LockResult<G>, context: &str) -> G {
    result.unwrap_or_else(|poison_err: PoisonError<G>| {
        log::error!(
            "Recovered poisoned lock in {}; a panic occurred while it was held",
            context
        );
        poison_err.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex, RwLock};
    use std::thread;

    #[derive(Debug, PartialEq)]
    struct TestError {
        message: String,
    }

    fn poisoned_mutex(value: i32) -> Arc<Mutex<i32>> {
        let mutex = Arc::new(Mutex::new(value));
        let mutex_clone = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = mutex_clone.lock().unwrap();
            panic!("Intentional panic to poison mutex");
        })
        .join();
        mutex
    }

    #[test]
    fn test_handle_mutex_poison_success() {
        let mutex = Mutex::new(42);
        let result = handle_mutex_poison(mutex.lock(), |msg| TestError { message: msg });
        assert_eq!(*result.unwrap(), 42);
    }

    #[test]
    fn test_handle_mutex_poison_with_poisoned_mutex() {
        let mutex = poisoned_mutex(42);
        let result = handle_mutex_poison(mutex.lock(), |msg| TestError { message: msg });

        let error = result.unwrap_err();
        assert!(error.message.contains("lock poisoned"));
        assert!(error.message.contains("panic occurred"));
    }

    #[test]
    fn test_handle_rwlock_write_success() {
        let rwlock = RwLock::new(42);
        *handle_mutex_poison(rwlock.write(), |msg| TestError { message: msg }).unwrap() = 100;
        assert_eq!(*rwlock.read().unwrap(), 100);
    }

    #[test]
    fn test_recover_poisoned_returns_inner_value() {
        let mutex = poisoned_mutex(7);
        let guard = recover_poisoned(mutex.lock(), "test");
        assert_eq!(*guard, 7);
    }
}
