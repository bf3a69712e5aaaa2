//! Bounded worker pool for batch downloads.
//!
//! A [`WorkerPool`] owns a fixed number of execution slots. Each batch of
//! work opens a [`Batch`]: tasks submitted to it run as tokio tasks but only
//! make progress while holding a slot, so every batch of one pool shares the
//! same concurrency limit.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use fetchcache_core::Error;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinSet};

/// Default number of concurrent slots.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Identifies one submitted task within its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// Fixed-size set of concurrent execution slots.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    size: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl WorkerPool {
    /// Create a pool with `size` slots (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self { slots: Arc::new(Semaphore::new(size)), size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Open a new group of tasks running on this pool's slots.
    pub fn batch<T: Send + 'static>(&self) -> Batch<T> {
        Batch { slots: Arc::clone(&self.slots), tasks: JoinSet::new(), aborts: HashMap::new(), next_id: 0 }
    }
}

/// A group of tasks submitted to a [`WorkerPool`].
///
/// Dropping a batch aborts whatever is still running in it.
pub struct Batch<T> {
    slots: Arc<Semaphore>,
    tasks: JoinSet<(TaskHandle, T)>,
    aborts: HashMap<TaskHandle, AbortHandle>,
    next_id: u64,
}

impl<T: Send + 'static> Batch<T> {
    /// Submit a task. It starts once a slot is free.
    pub fn submit<F>(&mut self, task: F) -> TaskHandle
    where
        F: Future<Output = T> + Send + 'static,
    {
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;

        let slots = Arc::clone(&self.slots);
        let abort = self.tasks.spawn(async move {
            // NOTE: Hold permit for task duration to enforce concurrency limit
            let _permit = slots.acquire_owned().await;
            (handle, task.await)
        });
        self.aborts.insert(handle, abort);
        handle
    }

    /// Request cancellation of one task. Best-effort: a task that already
    /// finished still reports its output from [`Batch::next`].
    ///
    /// Returns false if the handle is unknown or already reported.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        match self.aborts.remove(&handle) {
            Some(abort) => {
                abort.abort();
                true
            }
            None => false,
        }
    }

    /// Request cancellation of every task still pending. Returns how many
    /// cancellation requests were issued.
    pub fn cancel_all(&mut self) -> usize {
        let pending = self.aborts.len();
        for (_, abort) in self.aborts.drain() {
            abort.abort();
        }
        pending
    }

    /// Number of tasks not yet reported by [`Batch::next`].
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next task to finish, in completion order.
    ///
    /// Cancelled tasks are skipped. Returns `None` once every task has
    /// been reported or cancelled.
    ///
    /// # Errors
    ///
    /// `Error::TaskFailed` if a task panicked.
    pub async fn next(&mut self) -> Option<Result<(TaskHandle, T), Error>> {
        loop {
            match self.tasks.join_next().await? {
                Ok((handle, output)) => {
                    self.aborts.remove(&handle);
                    return Some(Ok((handle, output)));
                }
                Err(e) if e.is_cancelled() => continue,
                Err(e) => return Some(Err(Error::TaskFailed(e.to_string()))),
            }
        }
    }
}
