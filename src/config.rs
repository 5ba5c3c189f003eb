//! Runtime configuration
//!
//! Defaults overlaid with environment variables. The CLI itself takes only the
//! export path; everything tunable lives here.

use chrono::Duration;
use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

use crate::cache::DEFAULT_TTL_DAYS;

/// Root of the TMDB v3 API
pub const TMDB_API_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Default cap on posts resolved concurrently
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

pub const ENV_CACHE_DIR: &str = "REELPRESS_CACHE_DIR";
pub const ENV_CACHE_TTL_DAYS: &str = "REELPRESS_CACHE_TTL_DAYS";
pub const ENV_MAX_CONCURRENT: &str = "REELPRESS_MAX_CONCURRENT";
pub const ENV_API_KEY: &str = "TMDB_API_KEY";
pub const ENV_API_URL: &str = "TMDB_API_URL";

/// Error types for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but its value cannot be used
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

/// Settings for a migration run
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// Root of all caches
    pub cache_dir: PathBuf,
    /// Maximum age of a cache entry
    pub cache_ttl: Duration,
    /// Maximum posts resolved at once
    pub max_concurrent: usize,
    /// TMDB API key
    pub api_key: Option<String>,
    /// TMDB API root
    pub api_base_url: String,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_ttl: Duration::days(DEFAULT_TTL_DAYS),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            api_key: None,
            api_base_url: TMDB_API_BASE_URL.to_string(),
        }
    }
}

impl MigrateConfig {
    /// Builds the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(ENV_CACHE_DIR) {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(days) = get(ENV_CACHE_TTL_DAYS) {
            config.cache_ttl = days
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|d| *d >= 0)
                .and_then(Duration::try_days)
                .ok_or(ConfigError::InvalidValue {
                    var: ENV_CACHE_TTL_DAYS,
                    value: days.clone(),
                })?;
        }
        if let Some(limit) = get(ENV_MAX_CONCURRENT) {
            config.max_concurrent = limit
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidValue {
                    var: ENV_MAX_CONCURRENT,
                    value: limit.clone(),
                })?;
        }
        config.api_key = get(ENV_API_KEY);
        if let Some(url) = get(ENV_API_URL) {
            config.api_base_url = url;
        }

        Ok(config)
    }

    /// Directory holding one JSON file per movie id
    pub fn movies_dir(&self) -> PathBuf {
        self.cache_dir.join("movies")
    }

    /// Directory holding poster images, one subdirectory per size
    pub fn posters_dir(&self) -> PathBuf {
        self.cache_dir.join("posters")
    }
}

/// XDG cache directory (`~/.cache/reelpress/` on Linux)
///
/// Falls back to `.reelpress-cache` in the working directory when no home
/// directory can be determined.
pub fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "reelpress")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".reelpress-cache"))
}
