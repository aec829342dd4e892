//! Per-user registry of running background tasks, used by `/cancel`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::AbortHandle;
use tracing::{debug, info};

type TaskMap = HashMap<i64, Vec<(u64, AbortHandle)>>;

#[derive(Clone, Debug, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<TaskMap>>,
    next_id: Arc<AtomicU64>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` on the runtime and track it under `user_id`.
    ///
    /// The entry removes itself once the task finishes.
    pub fn spawn<F>(&self, user_id: i64, future: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let registry = self.clone();

        // Held across spawn so the task cannot deregister before it is registered
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = tokio::spawn(async move {
            future.await;
            registry.remove(user_id, task_id);
        });
        tasks
            .entry(user_id)
            .or_default()
            .push((task_id, handle.abort_handle()));

        debug!(user_id = %user_id, task_id, "Task registered");
        task_id
    }

    fn remove(&self, user_id: i64, task_id: u64) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = tasks.get_mut(&user_id) {
            entries.retain(|(id, _)| *id != task_id);
            if entries.is_empty() {
                tasks.remove(&user_id);
            }
        }
    }

    /// Number of unfinished tasks for `user_id`
    pub fn active(&self, user_id: i64) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks
            .get(&user_id)
            .map(|entries| entries.iter().filter(|(_, h)| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Abort every unfinished task of `user_id`; returns how many were aborted
    pub fn cancel_user(&self, user_id: i64) -> usize {
        let entries = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.remove(&user_id).unwrap_or_default()
        };

        let mut cancelled = 0;
        for (_, handle) in entries {
            if !handle.is_finished() {
                handle.abort();
                cancelled += 1;
            }
        }

        if cancelled > 0 {
            info!(user_id = %user_id, cancelled, "Cancelled user tasks");
        }
        cancelled
    }
}
