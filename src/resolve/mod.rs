//! Cache-then-fetch resolvers
//!
//! Each resolver checks its cache store first and only calls the network when
//! the entry is missing, stale or corrupt. Fetched values are written back by
//! background tasks so callers never wait on the disk.

mod configuration;
mod flight;
mod metadata;
mod poster;

pub use configuration::{ConfigurationResolver, CONFIGURATION_CACHE_KEY};
pub use metadata::MetadataResolver;
pub use poster::{PosterResolver, ORIGINAL_SIZE};

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{BackgroundWrites, CacheError, CacheStore};
use crate::data::TmdbError;

/// Errors surfaced by a resolution
///
/// Cache misses never appear here; they only lead to a fetch.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Metadata or configuration request failed
    #[error("metadata service error: {0}")]
    Service(#[from] TmdbError),

    /// Poster request failed before a response arrived, or mid-body
    #[error("poster request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Poster server answered with something other than 200
    #[error("poster download from {url} failed with HTTP {status}")]
    Download { url: String, status: StatusCode },

    /// Downloaded poster could not be stored
    #[error("poster could not be stored: {0}")]
    Storage(#[from] CacheError),

    /// A concurrent resolution of the same key failed
    #[error("shared fetch for {key} failed: {message}")]
    Coalesced { key: String, message: String },
}

/// Writes `value` under `key` without blocking the caller
///
/// Failures are logged and otherwise ignored.
fn persist_in_background<T>(writes: &BackgroundWrites, store: CacheStore, key: String, value: T)
where
    T: Serialize + Send + Sync + 'static,
{
    writes.spawn(async move {
        match store.write(&key, &value).await {
            Ok(path) => debug!(key = %key, path = %path.display(), "cache entry written"),
            Err(err) => warn!(key = %key, error = %err, "failed to write cache entry"),
        }
    });
}
