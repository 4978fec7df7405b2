// ============================================================================
// Completion Queue
// ============================================================================
//
// Shared executor handle for asynchronous calls. The runtime is owned by the
// application; the queue only schedules work and timers onto it, so backoff
// waits never block a thread.
//
// ============================================================================

use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct CompletionQueue {
    handle: Handle,
}

impl CompletionQueue {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime of the calling task.
    ///
    /// # Panics
    /// Panics when called outside of a Tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Completes after `delay` has elapsed.
    pub async fn make_relative_timer(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}
