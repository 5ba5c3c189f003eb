//! Poster image resolution
//!
//! Posters are cached as raw bytes under `<posters>/<size>/<poster id>`. A
//! cached file is trusted on freshness alone; its content is never inspected.

use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::flight::InFlight;
use super::{ConfigurationResolver, ResolveError};
use crate::cache::CacheStore;
use crate::data::MovieService;

/// Size variant used when none is requested
pub const ORIGINAL_SIZE: &str = "original";

/// Resolves poster ids to local image files
pub struct PosterResolver<S> {
    http: Client,
    store: CacheStore,
    configuration: Arc<ConfigurationResolver<S>>,
    in_flight: InFlight<PathBuf>,
}

impl<S: MovieService> PosterResolver<S> {
    pub fn new(
        http: Client,
        store: CacheStore,
        configuration: Arc<ConfigurationResolver<S>>,
    ) -> Self {
        Self {
            http,
            store,
            configuration,
            in_flight: InFlight::new(),
        }
    }

    /// Resolves `poster_id` at the original size
    pub async fn resolve(&self, poster_id: &str) -> Result<PathBuf, ResolveError> {
        self.resolve_sized(poster_id, ORIGINAL_SIZE).await
    }

    /// Returns the local path of `poster_id` at `size`, downloading it if the
    /// cached copy is missing or stale
    ///
    /// The remote URL is the configured image base URL followed by `size` and
    /// `poster_id`, e.g. `http://image.tmdb.org/t/p/` + `original` +
    /// `/poster.jpg`. Concurrent calls for the same poster and size share one
    /// download.
    pub async fn resolve_sized(&self, poster_id: &str, size: &str) -> Result<PathBuf, ResolveError> {
        let path = self.store.asset_path(poster_id, size);
        let key = path.to_string_lossy().into_owned();
        self.in_flight
            .run(&key, || self.load(poster_id, size, path))
            .await
    }

    async fn load(&self, poster_id: &str, size: &str, path: PathBuf) -> Result<PathBuf, ResolveError> {
        match self.store.validate_freshness(&path).await {
            Ok(()) => {
                debug!(poster_id, size, "poster cache hit");
                return Ok(path);
            }
            Err(reason) => debug!(poster_id, size, %reason, "poster cache miss"),
        }

        let base_url = self.configuration.base_url().await?;
        let url = format!("{}{}{}", base_url, size, poster_id);
        self.download(url, poster_id, size).await
    }

    /// Streams `url` into the poster cache
    ///
    /// The body goes to a staging file that is renamed into place only once
    /// complete; on any error it is removed and an existing poster is kept.
    async fn download(&self, url: String, poster_id: &str, size: &str) -> Result<PathBuf, ResolveError> {
        let mut response = self.http.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ResolveError::Download { url, status });
        }

        let mut staged = self.store.stage_asset(poster_id, size).await?;
        let streamed = async {
            let mut written = 0u64;
            while let Some(chunk) = response.chunk().await? {
                staged.write_chunk(&chunk).await?;
                written += chunk.len() as u64;
            }
            Ok::<u64, ResolveError>(written)
        }
        .await;

        let bytes = match streamed {
            Ok(bytes) => bytes,
            Err(err) => {
                staged.discard().await;
                return Err(err);
            }
        };
        let path = staged.commit().await?;
        info!(url = %url, bytes, path = %path.display(), "poster downloaded");
        Ok(path)
    }
}
