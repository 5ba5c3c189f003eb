//! Movie metadata resolution

use std::sync::Arc;
use tracing::debug;

use super::flight::InFlight;
use super::{persist_in_background, ResolveError};
use crate::cache::{BackgroundWrites, CacheStore};
use crate::data::{MovieMetadata, MovieService};

/// Resolves movie metadata by TMDB id, cache first
pub struct MetadataResolver<S> {
    service: Arc<S>,
    store: CacheStore,
    writes: Arc<BackgroundWrites>,
    in_flight: InFlight<MovieMetadata>,
}

impl<S: MovieService> MetadataResolver<S> {
    pub fn new(service: Arc<S>, store: CacheStore, writes: Arc<BackgroundWrites>) -> Self {
        Self {
            service,
            store,
            writes,
            in_flight: InFlight::new(),
        }
    }

    /// Fetches metadata for the movie `id`
    ///
    /// # Behavior
    /// - Returns the cached entry if it is fresh and parses
    /// - Otherwise makes exactly one request to the service
    /// - On success the full payload is written to the cache in the background
    ///   and returned immediately
    /// - On failure nothing is cached and the error is returned; there is no
    ///   retry
    /// - Concurrent calls for the same `id` share one cache check and fetch
    pub async fn resolve(&self, id: &str) -> Result<MovieMetadata, ResolveError> {
        self.in_flight.run(id, || self.load(id)).await
    }

    async fn load(&self, id: &str) -> Result<MovieMetadata, ResolveError> {
        match self.store.validate_entry::<MovieMetadata>(id).await {
            Ok(movie) => {
                debug!(id, "movie metadata cache hit");
                return Ok(movie);
            }
            Err(reason) => debug!(id, %reason, "movie metadata cache miss"),
        }

        let movie = self.service.fetch_movie(id).await?;
        persist_in_background(&self.writes, self.store.clone(), id.to_string(), movie.clone());
        Ok(movie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::stub::StubService;
    use serde_json::{json, Value};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn matrix() -> Value {
        json!({
            "id": 603,
            "title": "The Matrix",
            "imdb_id": "tt0133093",
            "poster_path": "/poster.jpg",
            "release_date": "1999-03-30",
            "genres": [{"id": 28, "name": "Action"}],
            "tagline": "Welcome to the Real World."
        })
    }

    fn create_resolver(
        service: StubService,
    ) -> (MetadataResolver<StubService>, Arc<StubService>, Arc<BackgroundWrites>, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let service = Arc::new(service);
        let writes = Arc::new(BackgroundWrites::new());
        let resolver = MetadataResolver::new(
            Arc::clone(&service),
            CacheStore::new(temp_dir.path()),
            Arc::clone(&writes),
        );
        (resolver, service, writes, temp_dir)
    }

    #[tokio::test]
    async fn test_second_resolve_is_a_cache_hit() {
        let (resolver, service, writes, _temp_dir) =
            create_resolver(StubService::default().with_movie("603", matrix()));

        let first = resolver.resolve("603").await.unwrap();
        writes.flush().await;
        let second = resolver.resolve("603").await.unwrap();

        assert_eq!(service.movie_calls(), 1, "second call should not hit the service");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_of_one_id_fetch_once() {
        let (resolver, service, _writes, _temp_dir) = create_resolver(
            StubService::default()
                .with_movie("603", matrix())
                .with_delay(Duration::from_millis(30)),
        );

        let (first, second) = tokio::join!(resolver.resolve("603"), resolver.resolve("603"));

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(service.movie_calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_holds_full_payload() {
        let (resolver, _service, writes, temp_dir) =
            create_resolver(StubService::default().with_movie("603", matrix()));

        resolver.resolve("603").await.unwrap();
        writes.flush().await;

        let on_disk: Value =
            serde_json::from_slice(&std::fs::read(temp_dir.path().join("603.json")).unwrap())
                .unwrap();
        assert_eq!(on_disk, matrix());
    }

    #[tokio::test]
    async fn test_fresh_cache_entry_avoids_network() {
        let (resolver, service, _writes, temp_dir) = create_resolver(StubService::default());
        std::fs::write(temp_dir.path().join("603.json"), matrix().to_string()).unwrap();

        let movie = resolver.resolve("603").await.unwrap();

        assert_eq!(movie.title, "The Matrix");
        assert_eq!(service.movie_calls(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_refetched_and_replaced() {
        let (resolver, service, writes, temp_dir) =
            create_resolver(StubService::default().with_movie("603", matrix()));
        let path = temp_dir.path().join("603.json");
        std::fs::write(&path, "{ not json").unwrap();

        let movie = resolver.resolve("603").await.unwrap();
        writes.flush().await;

        assert_eq!(movie.title, "The Matrix");
        assert_eq!(service.movie_calls(), 1);
        let on_disk: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk["title"], "The Matrix");
    }

    #[tokio::test]
    async fn test_stale_cache_entry_is_refetched() {
        let (resolver, service, _writes, temp_dir) =
            create_resolver(StubService::default().with_movie("603", matrix()));
        let path = temp_dir.path().join("603.json");
        std::fs::write(&path, json!({"title": "Old Title"}).to_string()).unwrap();
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(31 * 24 * 60 * 60))
            .unwrap();

        let movie = resolver.resolve("603").await.unwrap();

        assert_eq!(movie.title, "The Matrix");
        assert_eq!(service.movie_calls(), 1);
    }

    #[tokio::test]
    async fn test_service_failure_propagates_without_caching() {
        let (resolver, service, writes, temp_dir) = create_resolver(StubService::default());

        let result = resolver.resolve("404").await;
        writes.flush().await;

        assert!(matches!(result, Err(ResolveError::Service(_))));
        assert_eq!(service.movie_calls(), 1, "failures are not retried");
        assert!(!temp_dir.path().join("404.json").exists());
    }

    #[tokio::test]
    async fn test_cache_write_failure_does_not_fail_resolve() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the cache directory should be
        let blocked = temp_dir.path().join("blocked");
        std::fs::write(&blocked, "").unwrap();

        let service = Arc::new(StubService::default().with_movie("603", matrix()));
        let writes = Arc::new(BackgroundWrites::new());
        let resolver =
            MetadataResolver::new(Arc::clone(&service), CacheStore::new(&blocked), Arc::clone(&writes));

        let movie = resolver.resolve("603").await;
        writes.flush().await;

        assert_eq!(movie.unwrap().title, "The Matrix");
    }
}
