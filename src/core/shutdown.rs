//! Shutdown Coordination
//!
//! A [`ShutdownCoordinator`] owns the root cancellation token of the process.
//! Signal handlers cancel it on the first SIGINT/SIGTERM/SIGHUP/SIGQUIT (or
//! Ctrl-C) and exit immediately on the second.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Exit status used when a second signal forces termination
pub const FORCED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    signals_received: Arc<AtomicUsize>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled once shutdown is requested
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn trigger_shutdown(&self, reason: &str) {
        if !self.token.is_cancelled() {
            log::info!("Shutdown requested: {}", reason);
        }
        self.token.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been requested
    pub async fn requested(&self) {
        self.token.cancelled().await
    }

    /// Count a received signal; returns `true` when it should force an exit
    fn on_signal(&self, name: &str) -> bool {
        let previous = self.signals_received.fetch_add(1, Ordering::AcqRel);
        self.trigger_shutdown(name);
        previous >= 1
    }

    /// Spawn signal listeners on the current tokio runtime
    pub fn install_signal_handlers(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            unsafe {
                libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            }

            let signals = [
                (SignalKind::interrupt(), "SIGINT"),
                (SignalKind::terminate(), "SIGTERM"),
                (SignalKind::hangup(), "SIGHUP"),
                (SignalKind::quit(), "SIGQUIT"),
            ];
            for (kind, name) in signals {
                let coordinator = self.clone();
                tokio::spawn(async move {
                    let Ok(mut stream) = signal(kind) else {
                        log::debug!("Could not listen for {}", name);
                        return;
                    };
                    while stream.recv().await.is_some() {
                        if coordinator.on_signal(name) {
                            log::warn!("Second signal received; exiting");
                            std::process::exit(FORCED_EXIT_CODE);
                        }
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            let coordinator = self.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if coordinator.on_signal("Ctrl-C") {
                        log::warn!("Second Ctrl-C received; exiting");
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_starts_not_requested() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutdown_requested());
        assert!(!coordinator.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_trigger_cancels_all_token_clones() {
        let coordinator = ShutdownCoordinator::new();
        let token = coordinator.token();
        let child = token.child_token();

        coordinator.trigger_shutdown("test");

        assert!(coordinator.is_shutdown_requested());
        assert!(token.is_cancelled());
        assert!(child.is_cancelled());
        assert!(timeout(Duration::from_millis(100), coordinator.requested())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let coordinator = ShutdownCoordinator::new();
        let clone = coordinator.clone();
        clone.trigger_shutdown("from clone");
        assert!(coordinator.is_shutdown_requested());
    }

    #[test]
    fn test_second_signal_forces_exit() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.on_signal("SIGINT"));
        assert!(coordinator.is_shutdown_requested());
        assert!(coordinator.on_signal("SIGINT"));
    }
}
