//! Service configuration resolution
//!
//! The configuration is needed before any poster URL can be built. It is
//! resolved at most once per resolver: the first caller runs the
//! cache-then-fetch path, concurrent callers wait on that same attempt, and
//! later callers read the stored value without any I/O.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{persist_in_background, ResolveError};
use crate::cache::{BackgroundWrites, CacheStore};
use crate::data::{MovieService, ServiceConfiguration};

/// Cache key of the configuration entry
pub const CONFIGURATION_CACHE_KEY: &str = "configuration";

/// Resolves and holds the service configuration
pub struct ConfigurationResolver<S> {
    service: Arc<S>,
    store: CacheStore,
    writes: Arc<BackgroundWrites>,
    resolved: OnceCell<ServiceConfiguration>,
}

impl<S: MovieService> ConfigurationResolver<S> {
    /// `store` should be rooted at the top of the cache; the entry lives at
    /// `<root>/configuration.json`.
    pub fn new(service: Arc<S>, store: CacheStore, writes: Arc<BackgroundWrites>) -> Self {
        Self {
            service,
            store,
            writes,
            resolved: OnceCell::new(),
        }
    }

    /// Returns the configuration, resolving it on first use
    ///
    /// If the first resolution fails, its error goes to the caller that ran
    /// it and the next caller tries again.
    pub async fn resolve(&self) -> Result<&ServiceConfiguration, ResolveError> {
        if let Some(config) = self.resolved.get() {
            return Ok(config);
        }
        self.resolved.get_or_try_init(|| self.load()).await
    }

    /// Image base URL, e.g. "http://image.tmdb.org/t/p/"
    pub async fn base_url(&self) -> Result<&str, ResolveError> {
        Ok(self.resolve().await?.images.base_url.as_str())
    }

    async fn load(&self) -> Result<ServiceConfiguration, ResolveError> {
        match self
            .store
            .validate_entry::<ServiceConfiguration>(CONFIGURATION_CACHE_KEY)
            .await
        {
            Ok(config) => {
                debug!("configuration cache hit");
                return Ok(config);
            }
            Err(reason) => debug!(%reason, "configuration cache miss"),
        }

        let config = self.service.fetch_configuration().await?;
        info!(base_url = %config.images.base_url, "fetched service configuration");
        persist_in_background(
            &self.writes,
            self.store.clone(),
            CONFIGURATION_CACHE_KEY.to_string(),
            config.clone(),
        );
        Ok(config)
    }
}
