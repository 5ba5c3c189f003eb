//! Best-effort background cache writes
//!
//! Resolvers hand cache writes to `BackgroundWrites` so a fetched value can be
//! returned without waiting on the disk. The batch driver drains outstanding
//! writes once at the end; anything still pending when the runtime shuts down
//! is lost, which only costs a refetch on the next run.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::warn;

/// Set of spawned cache write tasks
#[derive(Debug, Default)]
pub struct BackgroundWrites {
    tasks: Mutex<JoinSet<()>>,
}

impl BackgroundWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `write` on the current runtime without awaiting it
    ///
    /// The future is responsible for logging its own failure.
    pub fn spawn<F>(&self, write: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        // Reap finished writes so the set doesn't grow with the batch
        while tasks.try_join_next().is_some() {}
        tasks.spawn(write);
    }

    /// Number of writes not yet reaped
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Waits for every write spawned so far
    pub async fn flush(&self) {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        while let Some(result) = tasks.join_next().await {
            if let Err(err) = result {
                warn!(error = %err, "cache write task did not complete");
            }
        }
    }
}
