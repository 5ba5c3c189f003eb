//! Batch migration of exported posts
//!
//! For each post: metadata first, then the poster named in that metadata.
//! Posts are independent; a failure on one is logged and never affects the
//! others.

use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{BackgroundWrites, CacheStore};
use crate::config::MigrateConfig;
use crate::data::{MovieMetadata, MovieService, Post, Term};
use crate::resolve::{ConfigurationResolver, MetadataResolver, PosterResolver};

/// Movie fields merged into a migrated post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub title: String,
    pub genres: Vec<String>,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
}

impl From<&MovieMetadata> for MovieDetails {
    fn from(movie: &MovieMetadata) -> Self {
        Self {
            title: movie.title.clone(),
            genres: movie.genre_names(),
            release_date: movie.release_date.clone(),
            poster_path: movie.poster_path.clone(),
        }
    }
}

/// A post with whatever metadata could be resolved for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigratedPost {
    /// Post title from the export
    pub post_title: String,
    pub date: Option<String>,
    pub content: String,
    pub terms: Vec<Term>,
    pub tmdb_id: Option<String>,
    /// From the metadata when resolved, else from the export
    pub imdb_id: Option<String>,
    pub movie: Option<MovieDetails>,
    /// Local poster file
    pub poster: Option<PathBuf>,
    /// The post carried no TMDB id, so nothing was fetched
    pub missing_tmdb_id: bool,
}

impl From<Post> for MigratedPost {
    fn from(post: Post) -> Self {
        let missing_tmdb_id = post.movie_id().is_none();
        Self {
            post_title: post.title,
            date: post.date,
            content: post.content,
            terms: post.terms,
            tmdb_id: post.tmdb_id,
            imdb_id: post.imdb_id,
            movie: None,
            poster: None,
            missing_tmdb_id,
        }
    }
}

/// Drives metadata and poster resolution over a batch of posts
pub struct Migrator<S> {
    metadata: MetadataResolver<S>,
    posters: PosterResolver<S>,
    writes: Arc<BackgroundWrites>,
    max_concurrent: usize,
}

impl<S: MovieService> Migrator<S> {
    /// Wires the resolvers over the cache layout in `config`
    ///
    /// - `<cache_dir>/configuration.json`
    /// - `<cache_dir>/movies/<id>.json`
    /// - `<cache_dir>/posters/<size>/<poster id>`
    pub fn new(service: S, http: Client, config: &MigrateConfig) -> Self {
        let service = Arc::new(service);
        let writes = Arc::new(BackgroundWrites::new());
        let store = |root: PathBuf| CacheStore::new(root).with_ttl(config.cache_ttl);

        let configuration = Arc::new(ConfigurationResolver::new(
            Arc::clone(&service),
            store(config.cache_dir.clone()),
            Arc::clone(&writes),
        ));
        let metadata = MetadataResolver::new(
            Arc::clone(&service),
            store(config.movies_dir()),
            Arc::clone(&writes),
        );
        let posters = PosterResolver::new(http, store(config.posters_dir()), configuration);

        Self {
            metadata,
            posters,
            writes,
            max_concurrent: config.max_concurrent.max(1),
        }
    }

    /// Resolves a single post
    ///
    /// Never fails: problems are logged and the record keeps whatever was
    /// resolved before the failure.
    pub async fn migrate_post(&self, post: Post) -> MigratedPost {
        let Some(id) = post.movie_id().map(str::to_string) else {
            warn!(title = %post.title, "post has no TMDB id; leaving it without metadata");
            return MigratedPost::from(post);
        };

        let title = post.title.clone();
        let mut migrated = MigratedPost::from(post);

        let movie = match self.metadata.resolve(&id).await {
            Ok(movie) => movie,
            Err(err) => {
                warn!(title = %title, id = %id, error = %err, "failed to resolve movie metadata");
                return migrated;
            }
        };

        if movie.imdb_id.is_some() {
            migrated.imdb_id = movie.imdb_id.clone();
        }
        migrated.movie = Some(MovieDetails::from(&movie));

        if let Some(poster_id) = movie.poster_path.as_deref() {
            match self.posters.resolve(poster_id).await {
                Ok(path) => migrated.poster = Some(path),
                Err(err) => {
                    warn!(title = %title, poster_id, error = %err, "failed to resolve poster")
                }
            }
        }

        migrated
    }

    /// Resolves every post, at most `max_concurrent` at a time
    ///
    /// Records come back in input order. Outstanding cache writes are drained
    /// before returning.
    pub async fn migrate_all(&self, posts: Vec<Post>) -> Vec<MigratedPost> {
        let total = posts.len();
        info!(total, max_concurrent = self.max_concurrent, "migrating posts");

        let migrated: Vec<MigratedPost> = stream::iter(posts)
            .map(|post| self.migrate_post(post))
            .buffered(self.max_concurrent)
            .collect()
            .await;

        self.writes.flush().await;

        let with_movie = migrated.iter().filter(|p| p.movie.is_some()).count();
        let missing_id = migrated.iter().filter(|p| p.missing_tmdb_id).count();
        info!(total, with_movie, missing_id, "migration finished");
        migrated
    }
}
