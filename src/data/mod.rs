//! Core data models for reelpress
//!
//! Movie metadata and service configuration as returned by TMDB, and posts as
//! read from the WordPress export.

pub mod export;
pub mod tmdb;

pub use export::{parse_export, ExportError, Post, Term};
pub use tmdb::{MovieService, TmdbClient, TmdbError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Movie details from the metadata service
///
/// Only the fields reelpress reads are named; everything else the service
/// returned is kept in `extra`, so caching and re-serializing preserves the
/// full payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieMetadata {
    /// Movie title
    pub title: String,
    /// IMDb cross-reference identifier (e.g. "tt0133093")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    /// Poster image identifier (e.g. "/poster.jpg")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    /// Release date as given by the service (YYYY-MM-DD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    /// Genre objects
    #[serde(default)]
    pub genres: Vec<Genre>,
    /// Remaining fields of the upstream payload
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MovieMetadata {
    /// Genre names in service order
    pub fn genre_names(&self) -> Vec<String> {
        self.genres.iter().map(|g| g.name.clone()).collect()
    }
}

/// A genre as embedded in movie details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Service-wide configuration from the metadata service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    pub images: ImagesConfiguration,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Image hosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagesConfiguration {
    /// Prefix for image URLs; a size variant and poster id are appended
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_base_url: Option<String>,
    /// Size variants the service offers for posters
    #[serde(default)]
    pub poster_sizes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matrix_payload() -> Value {
        json!({
            "id": 603,
            "title": "The Matrix",
            "imdb_id": "tt0133093",
            "poster_path": "/poster.jpg",
            "release_date": "1999-03-30",
            "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}],
            "runtime": 136
        })
    }

    #[test]
    fn test_movie_metadata_keeps_named_fields() {
        let movie: MovieMetadata = serde_json::from_value(matrix_payload()).unwrap();

        assert_eq!(movie.title, "The Matrix");
        assert_eq!(movie.imdb_id.as_deref(), Some("tt0133093"));
        assert_eq!(movie.poster_path.as_deref(), Some("/poster.jpg"));
        assert_eq!(movie.release_date.as_deref(), Some("1999-03-30"));
        assert_eq!(movie.genre_names(), vec!["Action", "Science Fiction"]);
    }

    #[test]
    fn test_movie_metadata_preserves_full_payload() {
        let payload = matrix_payload();
        let movie: MovieMetadata = serde_json::from_value(payload.clone()).unwrap();

        assert_eq!(movie.extra.get("runtime"), Some(&json!(136)));
        assert_eq!(movie.genres[0].extra.get("id"), Some(&json!(28)));
        assert_eq!(serde_json::to_value(&movie).unwrap(), payload);
    }

    #[test]
    fn test_movie_metadata_optional_fields_may_be_missing() {
        let movie: MovieMetadata = serde_json::from_value(json!({"title": "Untitled"})).unwrap();

        assert!(movie.imdb_id.is_none());
        assert!(movie.poster_path.is_none());
        assert!(movie.genre_names().is_empty());
    }

    #[test]
    fn test_movie_metadata_requires_title() {
        let result = serde_json::from_value::<MovieMetadata>(json!({"id": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_service_configuration_parses_images() {
        let config: ServiceConfiguration = serde_json::from_value(json!({
            "images": {
                "base_url": "http://image.tmdb.org/t/p/",
                "secure_base_url": "https://image.tmdb.org/t/p/",
                "poster_sizes": ["w92", "w500", "original"]
            },
            "change_keys": ["adult"]
        }))
        .unwrap();

        assert_eq!(config.images.base_url, "http://image.tmdb.org/t/p/");
        assert_eq!(config.images.poster_sizes.len(), 3);
        assert!(config.extra.contains_key("change_keys"));
    }
}
