//! Handle to a cancellable background task.
//!
//! Registries run their poll and health-monitor loops on tokio tasks and hand
//! the caller a [`TaskHandle`]. The loop body receives the handle's
//! [`CancellationToken`] and is expected to exit promptly once it fires.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellable handle to a spawned background task.
///
/// Cloning shares the same task. `cancel()` is idempotent and safe to call
/// after the task has finished.
#[derive(Clone)]
pub struct TaskHandle {
    cancel_token: CancellationToken,
    join_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl TaskHandle {
    /// Spawn `task` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn_with_token(CancellationToken::new(), task)
    }

    /// Spawn `task` driven by an existing token.
    ///
    /// Passing a child token ties the task to a parent's cancellation while
    /// still letting this handle be cancelled on its own.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn_with_token<F, Fut>(cancel_token: CancellationToken, task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let join_handle = tokio::spawn(task(cancel_token.clone()));
        Self {
            cancel_token,
            join_handle: Arc::new(Mutex::new(Some(join_handle))),
        }
    }

    /// Request the task to stop.
    pub fn cancel(&self) {
        if !self.cancel_token.is_cancelled() {
            debug!("Cancelling background task");
            self.cancel_token.cancel();
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Returns true once the task has run to completion (or was already joined).
    ///
    /// Reports `false` while another caller is joining.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join_handle
            .try_lock()
            .is_ok_and(|guard| guard.as_ref().is_none_or(JoinHandle::is_finished))
    }

    /// A token that fires when this handle is cancelled.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Wait for the task to finish.
    ///
    /// Only the first caller actually awaits the task; later calls return
    /// immediately. Panics inside the task are logged, not propagated.
    pub async fn join(&self) {
        let handle = self.join_handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    debug!(error = %e, "Background task panicked");
                }
            }
        }
    }

    /// Cancel and wait for the task to finish.
    pub async fn shutdown(&self) {
        self.cancel();
        self.join().await;
    }
}
