//! Graceful Shutdown Handler
//!
//! Provides the cancellation token that governs every monitor and waits
//! for running monitors to wind down.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Shutdown coordinator for graceful termination.
///
/// Tracks active monitors and cancels them all on shutdown.
#[derive(Clone)]
pub struct ShutdownController {
    /// Root token; monitors receive child tokens
    token: CancellationToken,
    /// Number of monitors currently running
    active_monitors: Arc<AtomicUsize>,
    /// Notify when all monitors have stopped
    drain_complete: Arc<Notify>,
}

impl ShutdownController {
    /// Create a new shutdown controller.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            active_monitors: Arc::new(AtomicUsize::new(0)),
            drain_complete: Arc::new(Notify::new()),
        }
    }

    /// Token cancelled when shutdown is initiated.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Initiate graceful shutdown.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("initiating graceful shutdown");
            self.token.cancel();
        }
    }

    /// Check if shutdown has been initiated.
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Get the number of running monitors.
    pub fn active_monitors(&self) -> usize {
        self.active_monitors.load(Ordering::SeqCst)
    }

    fn monitor_started(&self) {
        self.active_monitors.fetch_add(1, Ordering::SeqCst);
    }

    fn monitor_stopped(&self) {
        let prev = self.active_monitors.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            self.drain_complete.notify_waiters();
        }
    }

    /// Wait for all monitors to stop (with timeout).
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let notified = self.drain_complete.notified();
        if self.active_monitors() == 0 {
            return true;
        }

        tokio::select! {
            _ = notified => true,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    active = self.active_monitors(),
                    "drain timeout: monitors still running"
                );
                false
            }
        }
    }

    /// Create a guard that counts a monitor as running until dropped.
    pub fn monitor_guard(&self) -> MonitorGuard {
        self.monitor_started();
        MonitorGuard {
            controller: self.clone(),
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for tracking running monitors.
pub struct MonitorGuard {
    controller: ShutdownController,
}

impl Drop for MonitorGuard {
    fn drop(&mut self) {
        self.controller.monitor_stopped();
    }
}

/// Wait for Ctrl+C or SIGTERM, then initiate shutdown.
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
        _ = controller.token.cancelled() => return,
    }

    controller.shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_controller_new() {
        let controller = ShutdownController::new();
        assert!(!controller.is_shutdown());
        assert_eq!(controller.active_monitors(), 0);
    }

    #[test]
    fn test_shutdown_cancels_child_tokens() {
        let controller = ShutdownController::default();
        let token = controller.token();
        assert!(!token.is_cancelled());

        controller.shutdown();
        assert!(token.is_cancelled());

        // Calling again should be idempotent
        controller.shutdown();
        assert!(controller.is_shutdown());
    }

    #[test]
    fn test_child_token_cancel_does_not_shutdown() {
        let controller = ShutdownController::new();
        let token = controller.token();
        token.cancel();
        assert!(!controller.is_shutdown());
    }

    #[test]
    fn test_monitor_guards() {
        let controller = ShutdownController::new();

        let guard1 = controller.monitor_guard();
        let guard2 = controller.monitor_guard();
        assert_eq!(controller.active_monitors(), 2);

        drop(guard1);
        assert_eq!(controller.active_monitors(), 1);

        drop(guard2);
        assert_eq!(controller.active_monitors(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_drain_immediate() {
        let controller = ShutdownController::new();
        controller.shutdown();

        assert!(controller.wait_for_drain(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_wait_for_drain_with_monitors() {
        let controller = ShutdownController::new();
        let guard = controller.monitor_guard();
        controller.shutdown();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });

        assert!(controller.wait_for_drain(Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_wait_for_drain_timeout() {
        let controller = ShutdownController::new();
        let _guard = controller.monitor_guard();
        controller.shutdown();

        assert!(!controller.wait_for_drain(Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn test_shutdown_signal_returns_when_already_shut_down() {
        let controller = ShutdownController::new();
        controller.shutdown();

        tokio::time::timeout(Duration::from_secs(1), shutdown_signal(controller))
            .await
            .unwrap();
    }
}
