//! File-backed cache store
//!
//! Provides a `CacheStore` that persists JSON entries and binary assets under a
//! root directory and validates them against a TTL using the files'
//! modification times.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Default time-to-live for cache entries in days
pub const DEFAULT_TTL_DAYS: i64 = 30;

/// Sequence for staging file names, unique within the process
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Reasons a cache entry cannot be used, or a write failed
#[derive(Debug, Error)]
pub enum CacheError {
    /// No entry exists at the derived location
    #[error("cache entry not found")]
    NotFound,

    /// The entry is older than the TTL
    #[error("cache entry is stale ({} days old)", .age.num_days())]
    Stale { age: Duration },

    /// The entry exists but does not parse as the expected type
    #[error("cache entry is corrupt: {0}")]
    Parse(#[from] serde_json::Error),

    /// Reading or writing the underlying file failed
    #[error("cache storage error: {0}")]
    Storage(#[from] io::Error),
}

/// Maps a read error to `NotFound` when the file is simply absent
fn read_error(err: io::Error) -> CacheError {
    if err.kind() == io::ErrorKind::NotFound {
        CacheError::NotFound
    } else {
        CacheError::Storage(err)
    }
}

/// Encodes a cache key into a single path component.
///
/// Percent-encodes everything outside ASCII letters, digits, `-`, `_`, `.`
/// and `~`. A leading `.` is also escaped so keys can never name `.`, `..` or
/// hidden files. The mapping is injective, and its output never contains `+`,
/// which is reserved for staging files.
pub fn encode_key(key: &str) -> String {
    // A lone `%` is never produced for a non-empty key
    if key.is_empty() {
        return "%".to_string();
    }

    match key.strip_prefix('.') {
        Some(rest) => format!("%2E{}", urlencoding::encode(rest)),
        None => urlencoding::encode(key).into_owned(),
    }
}

/// Reads and writes cache entries under a single root directory
///
/// Structured entries live at `<root>/<key>.json`; binary assets live at
/// `<root>/<variant>/<id>`. Use separate roots for structured and binary
/// caches so the two namespaces can never overlap.
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Directory where cache files are stored
    root: PathBuf,
    /// Maximum age before an entry is stale
    ttl: Duration,
}

impl CacheStore {
    /// Creates a store rooted at `root` with the default 30 day TTL
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ttl: Duration::days(DEFAULT_TTL_DAYS),
        }
    }

    /// Overrides the TTL used by freshness checks
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the configured TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the path of the structured entry for `key`
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_key(key)))
    }

    /// Returns the path of the binary asset `id` at `variant`
    pub fn asset_path(&self, id: &str, variant: &str) -> PathBuf {
        self.root.join(encode_key(variant)).join(encode_key(id))
    }

    /// Checks that the file at `path` exists and is younger than the TTL
    ///
    /// The content is never read.
    pub async fn validate_freshness(&self, path: &Path) -> Result<(), CacheError> {
        self.validate_freshness_at(path, Utc::now()).await
    }

    /// Freshness check against an explicit clock reading
    ///
    /// An entry last modified at `T` is fresh while `now - T < ttl` and stale
    /// from `T + ttl` onwards. Modification times in the future count as
    /// fresh.
    pub async fn validate_freshness_at(
        &self,
        path: &Path,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let metadata = fs::metadata(path).await.map_err(read_error)?;
        if !metadata.is_file() {
            return Err(CacheError::NotFound);
        }

        let modified: DateTime<Utc> = metadata.modified()?.into();
        let age = now.signed_duration_since(modified);
        if age >= self.ttl {
            return Err(CacheError::Stale { age });
        }
        Ok(())
    }

    /// Reads the structured entry for `key` and parses it as `T`
    pub async fn validate_contents<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
        let bytes = fs::read(self.entry_path(key)).await.map_err(read_error)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Returns the entry for `key` only if it is both fresh and parseable
    pub async fn validate_entry<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
        self.validate_freshness(&self.entry_path(key)).await?;
        self.validate_contents(key).await
    }

    /// Serializes `value` as JSON and replaces the entry for `key`
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - the path written
    /// * `Err(CacheError)` - if serialization, directory creation or writing fails
    pub async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<PathBuf, CacheError> {
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut staged = StagedFile::create(self.entry_path(key)).await?;
        if let Err(err) = staged.write_chunk(&json).await {
            staged.discard().await;
            return Err(err);
        }
        staged.commit().await
    }

    /// Opens a staging file for the binary asset `id` at `variant`
    ///
    /// Nothing is visible at the asset path until [`StagedFile::commit`].
    pub async fn stage_asset(&self, id: &str, variant: &str) -> Result<StagedFile, CacheError> {
        StagedFile::create(self.asset_path(id, variant)).await
    }
}

/// A file being written next to its final location
///
/// `commit` renames it into place; `discard` removes it. Dropping it without
/// either also removes it.
#[derive(Debug)]
pub struct StagedFile {
    file: fs::File,
    staging: StagingGuard,
    target: PathBuf,
}

impl StagedFile {
    async fn create(target: PathBuf) -> Result<Self, CacheError> {
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).await?;
        }

        let path = staging_path(&target);
        let file = fs::File::create(&path).await?;
        Ok(Self {
            file,
            staging: StagingGuard { path, armed: true },
            target,
        })
    }

    /// The path the file will have once committed
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Appends `chunk` to the staging file
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), CacheError> {
        self.file.write_all(chunk).await?;
        Ok(())
    }

    /// Flushes and atomically moves the file onto its target path
    ///
    /// On failure the staging file is removed when the guard drops.
    pub async fn commit(self) -> Result<PathBuf, CacheError> {
        let Self {
            mut file,
            mut staging,
            target,
        } = self;
        file.flush().await?;
        drop(file);

        fs::rename(&staging.path, &target).await?;
        staging.armed = false;
        Ok(target)
    }

    /// Removes the staging file, leaving any previous target untouched
    pub async fn discard(self) {
        let Self {
            file, mut staging, ..
        } = self;
        drop(file);
        if let Err(err) = fs::remove_file(&staging.path).await {
            debug!(path = %staging.path.display(), error = %err, "could not remove staging file");
        }
        staging.armed = false;
    }
}

/// Removes an abandoned staging file on drop
#[derive(Debug)]
struct StagingGuard {
    path: PathBuf,
    armed: bool,
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed abandoned staging file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "could not remove staging file")
            }
        }
    }
}

/// `<name>+<pid>-<seq>` next to the target
fn staging_path(target: &Path) -> PathBuf {
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = target
        .file_name()
        .map(OsStr::to_os_string)
        .unwrap_or_default();
    name.push(format!("+{}-{}", std::process::id(), seq));
    target.with_file_name(name)
}
