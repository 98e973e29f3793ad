use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Cancellable handle to a spawned background task.
///
/// The inner [`CancellationToken`] is cancelled when the handle is dropped, so a
/// handle going out of scope is enough to stop its task. Dropping after the task
/// has already finished is harmless.
#[derive(Debug)]
pub(crate) struct TaskHandle(CancellationToken);

impl TaskHandle {
    /// Spawn `future`, racing it against cancellation of the returned handle.
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = task_token.cancelled() => {}
                () = future => {}
            }
        });

        Self(token)
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let handle = TaskHandle::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            flag.store(true, Ordering::SeqCst);
        });

        drop(handle);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn live_handle_lets_task_finish() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let handle = TaskHandle::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(fired.load(Ordering::SeqCst));
        drop(handle);
    }
}
