//! Serial completion queue for callback style requests.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A queued completion callback.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs completion callbacks one at a time, in submission order.
///
/// Backed by a single Tokio task. A panicking callback is logged and does
/// not stop the queue.
#[derive(Debug, Clone)]
pub struct CompletionQueue {
    sender: mpsc::UnboundedSender<Job>,
}

impl CompletionQueue {
    /// Starts the queue on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!("Completion callback panicked");
                }
            }
            debug!("Completion queue stopped");
        });
        Self { sender }
    }

    /// Queues a callback.
    ///
    /// Hands the callback back if the queue has stopped, which happens when
    /// the runtime it was spawned on shuts down.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), Job> {
        self.sender.send(Box::new(job)).map_err(|rejected| rejected.0)
    }

    /// Returns true once the queue task is gone.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_runs_in_order() {
        let queue = CompletionQueue::spawn();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let seen = Arc::clone(&seen);
            assert!(queue.submit(move || seen.lock().unwrap().push(i)).is_ok());
        }
        let (done, finished) = oneshot::channel();
        assert!(
            queue
                .submit(move || {
                    let _ = done.send(());
                })
                .is_ok()
        );
        finished.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_survives_panicking_callback() {
        let queue = CompletionQueue::spawn();
        assert!(queue.submit(|| panic!("callback failure")).is_ok());

        let (done, finished) = oneshot::channel();
        assert!(
            queue
                .submit(move || {
                    let _ = done.send(42);
                })
                .is_ok()
        );
        assert_eq!(finished.await.unwrap(), 42);
    }

    #[test]
    fn test_stopped_queue_hands_job_back() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let queue = runtime.block_on(async { CompletionQueue::spawn() });
        drop(runtime);
        assert!(queue.is_closed());

        let (done, finished) = std::sync::mpsc::channel();
        let job = queue
            .submit(move || done.send(7).unwrap())
            .unwrap_err();
        job();
        assert_eq!(finished.recv().unwrap(), 7);
    }
}
