//! Graceful shutdown coordination via `CancellationToken`.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// Coordinates shutdown across the HTTP server and connection tasks.
///
/// Connection tasks register themselves through [`track`](Self::track);
/// [`graceful_shutdown`](Self::graceful_shutdown) cancels the token and
/// waits for every tracked task to finish, up to a timeout.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// A token that resolves once shutdown begins.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wrap a future so the coordinator waits for it during shutdown.
    pub fn track<F: Future>(&self, future: F) -> TrackedFuture<F> {
        self.tracker.track_future(future)
    }

    /// Number of tracked tasks still running.
    pub fn tracked(&self) -> usize {
        self.tracker.len()
    }

    /// Initiate shutdown. Safe to call more than once.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel everything, then wait up to `timeout` for tracked tasks.
    ///
    /// Tasks still running after the timeout are left to die with the
    /// process.
    pub async fn graceful_shutdown(&self, timeout: Duration) {
        self.shutdown();
        self.tracker.close();
        info!(
            task_count = self.tracker.len(),
            timeout_secs = timeout.as_secs(),
            "draining tasks"
        );

        if tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_err()
        {
            warn!("shutdown drain timed out after {timeout:?}");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
