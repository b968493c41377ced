//! Registry of in-flight requests.
//!
//! Every dispatched request is registered before `dispatch` returns and
//! removed exactly once, either when it is cancelled or when its
//! [`RegistrationGuard`] drops. Removal is idempotent, so the guard can
//! always run even after a cancellation already removed the entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use netkit_core::{HttpMethod, Request, TaskId};
use tokio::sync::oneshot;
use tracing::trace;
use url::Url;

/// Read-only view of one in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    /// Task identifier.
    pub id: TaskId,
    /// HTTP method.
    pub method: HttpMethod,
    /// Request URL.
    pub url: Url,
    /// When the request was dispatched.
    pub dispatched_at: DateTime<Utc>,
}

#[derive(Debug)]
struct InFlightTask {
    summary: TaskSummary,
    cancel: oneshot::Sender<()>,
}

/// Tracks requests between dispatch and completion.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, InFlightTask>>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<TaskId, InFlightTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a request.
    ///
    /// Returns the guard that deregisters it on drop and the receiver that
    /// fires when the request is cancelled.
    pub fn register(
        self: &Arc<Self>,
        id: TaskId,
        request: &Request,
    ) -> (RegistrationGuard, oneshot::Receiver<()>) {
        let (cancel, cancelled) = oneshot::channel();
        let summary = TaskSummary {
            id,
            method: request.method(),
            url: request.url().clone(),
            dispatched_at: Utc::now(),
        };
        let in_flight = {
            let mut tasks = self.tasks();
            tasks.insert(id, InFlightTask { summary, cancel });
            tasks.len()
        };
        trace!(task = %id, in_flight, "Task registered");

        let guard = RegistrationGuard {
            registry: Arc::clone(self),
            id,
        };
        (guard, cancelled)
    }

    /// Removes a finished task. Returns false if it was already gone.
    pub fn complete(&self, id: TaskId) -> bool {
        let removed = self.tasks().remove(&id).is_some();
        if removed {
            trace!(task = %id, "Task deregistered");
        }
        removed
    }

    /// Removes a task and signals its cancellation.
    ///
    /// Returns false if the task was not in flight.
    pub fn cancel(&self, id: TaskId) -> bool {
        let Some(task) = self.tasks().remove(&id) else {
            return false;
        };
        // The worker may have finished between removal and send.
        let _ = task.cancel.send(());
        trace!(task = %id, "Task cancelled");
        true
    }

    /// Cancels every in-flight task. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<InFlightTask> = self.tasks().drain().map(|(_, task)| task).collect();
        let count = drained.len();
        for task in drained {
            let _ = task.cancel.send(());
        }
        count
    }

    /// Returns the number of in-flight tasks.
    pub fn len(&self) -> usize {
        self.tasks().len()
    }

    /// Returns true if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.tasks().is_empty()
    }

    /// Returns the in-flight tasks, oldest first.
    pub fn snapshot(&self) -> Vec<TaskSummary> {
        let mut summaries: Vec<TaskSummary> = self
            .tasks()
            .values()
            .map(|task| task.summary.clone())
            .collect();
        summaries.sort_by_key(|summary| summary.dispatched_at);
        summaries
    }
}

/// Deregisters its task when dropped, including during unwinding.
#[derive(Debug)]
pub struct RegistrationGuard {
    registry: Arc<TaskRegistry>,
    id: TaskId,
}

impl RegistrationGuard {
    /// Returns the guarded task's identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.complete(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        Request::get("https://api.example.com/items").unwrap()
    }

    #[test]
    fn test_guard_deregisters_on_drop() {
        let registry = Arc::new(TaskRegistry::new());
        let (guard, _cancelled) = registry.register(TaskId::new(), &request());
        assert_eq!(registry.len(), 1);

        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_signals_and_removes_once() {
        let registry = Arc::new(TaskRegistry::new());
        let id = TaskId::new();
        let (guard, mut cancelled) = registry.register(id, &request());

        assert!(registry.cancel(id));
        assert!(!registry.cancel(id));
        assert!(cancelled.try_recv().is_ok());
        assert!(registry.is_empty());

        // Guard drop after cancellation is a no-op.
        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_all_drains() {
        let registry = Arc::new(TaskRegistry::new());
        let mut held = Vec::new();
        for _ in 0..4 {
            held.push(registry.register(TaskId::new(), &request()));
        }
        assert_eq!(registry.len(), 4);

        assert_eq!(registry.cancel_all(), 4);
        assert!(registry.is_empty());
        for (_, cancelled) in &mut held {
            assert!(cancelled.try_recv().is_ok());
        }
        assert_eq!(registry.cancel_all(), 0);
    }

    #[test]
    fn test_snapshot() {
        let registry = Arc::new(TaskRegistry::new());
        let id = TaskId::new();
        let _held = registry.register(id, &request());

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, id);
        assert_eq!(snapshot[0].method, HttpMethod::Get);
        assert_eq!(snapshot[0].url.as_str(), "https://api.example.com/items");
    }
}
