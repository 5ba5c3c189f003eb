//! TMDB API client
//!
//! `MovieService` is the seam the resolvers depend on; `TmdbClient` implements
//! it against the TMDB v3 REST API.

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::future::Future;
use thiserror::Error;

use super::{MovieMetadata, ServiceConfiguration};
use crate::config::TMDB_API_BASE_URL;

/// Errors that can occur when calling the metadata service
#[derive(Debug, Error)]
pub enum TmdbError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("TMDB returned HTTP {status_code}: {message}")]
    Api { status_code: u16, message: String },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Request/response access to movie metadata, keyed by identifier
pub trait MovieService: Send + Sync {
    /// Fetches the full details of the movie `id`
    fn fetch_movie(&self, id: &str) -> impl Future<Output = Result<MovieMetadata, TmdbError>> + Send;

    /// Fetches the service-wide configuration
    fn fetch_configuration(
        &self,
    ) -> impl Future<Output = Result<ServiceConfiguration, TmdbError>> + Send;
}

/// Client for the TMDB API
#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TmdbClient {
    /// Create a TmdbClient against the public API
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, TMDB_API_BASE_URL)
    }

    /// Create a TmdbClient against a custom API root
    pub fn with_base_url(
        client: Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a GET to `path` with the API key attached
    ///
    /// Transport errors are stripped of their URL, which carries the key in
    /// its query string.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, TmdbError> {
        let response = self
            .client
            .get(self.url(path))
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let body = response.text().await.map_err(reqwest::Error::without_url)?;
        if !status.is_success() {
            return Err(TmdbError::Api {
                status_code: status.as_u16(),
                message: body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// `/movie/{id}` with the id encoded as a single path segment
fn movie_path(id: &str) -> String {
    format!("/movie/{}", urlencoding::encode(id))
}

impl MovieService for TmdbClient {
    /// GET /movie/{movie_id}
    async fn fetch_movie(&self, id: &str) -> Result<MovieMetadata, TmdbError> {
        self.get(&movie_path(id)).await
    }

    /// GET /configuration
    async fn fetch_configuration(&self) -> Result<ServiceConfiguration, TmdbError> {
        self.get("/configuration").await
    }
}
