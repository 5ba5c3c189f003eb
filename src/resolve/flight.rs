//! Per-key request coalescing
//!
//! The first caller for a key runs the fetch; callers that arrive while it is
//! in flight wait for its outcome instead of fetching again. Nothing is kept
//! once the fetch completes, so later callers go back to the cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

use super::ResolveError;

/// What a waiting caller receives; errors travel as their message
type Outcome<V> = Option<Result<V, String>>;

/// Coalesces concurrent resolutions of the same key into one fetch
pub(crate) struct InFlight<V> {
    pending: Mutex<HashMap<String, watch::Receiver<Outcome<V>>>>,
}

enum Ticket<V> {
    Leader(watch::Sender<Outcome<V>>),
    Follower(watch::Receiver<Outcome<V>>),
}

/// Unregisters the leader's key however its fetch ends, including when the
/// leading future is dropped mid-flight
struct Leading<'a, V> {
    flight: &'a InFlight<V>,
    key: &'a str,
    sender: watch::Sender<Outcome<V>>,
}

impl<V> Drop for Leading<'_, V> {
    fn drop(&mut self) {
        self.flight.lock().remove(self.key);
    }
}

impl<V> InFlight<V> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, watch::Receiver<Outcome<V>>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> InFlight<V> {
    fn join(&self, key: &str) -> Ticket<V> {
        let mut pending = self.lock();
        match pending.get(key) {
            Some(receiver) => Ticket::Follower(receiver.clone()),
            None => {
                let (sender, receiver) = watch::channel(None);
                pending.insert(key.to_string(), receiver);
                Ticket::Leader(sender)
            }
        }
    }

    /// Runs `fetch` for `key` unless a fetch for it is already in flight
    ///
    /// The leader gets its own result back untouched. Followers get a clone
    /// of the value, or `ResolveError::Coalesced` carrying the leader's error
    /// message. If the leader is dropped before finishing, its followers fall
    /// back to fetching themselves.
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> Result<V, ResolveError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ResolveError>>,
    {
        let mut receiver = match self.join(key) {
            Ticket::Leader(sender) => {
                let leading = Leading {
                    flight: self,
                    key,
                    sender,
                };
                let result = fetch().await;
                let outcome = match &result {
                    Ok(value) => Ok(value.clone()),
                    Err(err) => Err(err.to_string()),
                };
                leading.sender.send_replace(Some(outcome));
                return result;
            }
            Ticket::Follower(receiver) => receiver,
        };

        debug!(key, "joining in-flight fetch");
        let outcome = receiver
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|shared| (*shared).clone());
        match outcome {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(ResolveError::Coalesced {
                key: key.to_string(),
                message,
            }),
            None => fetch().await,
        }
    }
}
