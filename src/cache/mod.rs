//! Persistent response cache.
//!
//! [`CacheStore`] maps a [`CacheKey`] to one [`CachedExchange`] stored as
//! `{root}/{key}.json`. There is no in-memory layer and no eviction: every
//! lookup and write goes through the filesystem, and records only disappear
//! through [`CacheStore::clear`].
//!
//! Read failures are split in two:
//!
//! - a missing record, or one that does not decode (truncated JSON, missing
//!   fields, bad base64, invalid UTF-8), is a miss;
//! - any other I/O error is returned to the caller.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

mod exchange;
mod key;

pub use exchange::CachedExchange;
pub use key::CacheKey;

/// Directory name used under the user's cache directory.
const DEFAULT_DIR_NAME: &str = "caching-proxy";

/// Distinguishes temporary files written concurrently by this process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Errors produced by the cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("could not determine a cache directory (no cache or home directory)")]
    NoDefaultDir,

    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read cache record {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write cache record {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode cache record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to clear cache directory {path}: {source}")]
    Clear {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Returns `$XDG_CACHE_HOME/caching-proxy`, falling back to
/// `~/.cache/caching-proxy`.
pub fn default_dir() -> Result<PathBuf, CacheError> {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
        .map(|base| base.join(DEFAULT_DIR_NAME))
        .ok_or(CacheError::NoDefaultDir)
}

/// Durable key → [`CachedExchange`] mapping rooted at one directory.
///
/// Safe to share between tasks. Writes of different keys never touch the same
/// file; concurrent writes of the same key race and the last rename wins.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Opens the store at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        create_root(&root).await?;
        debug!(root = %root.display(), "cache store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Looks up the exchange stored for `method` and `url`.
    ///
    /// Returns `Ok(None)` when nothing is stored or the stored record cannot
    /// be decoded.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Read`] when the record exists but reading it
    /// fails for a reason other than absence (e.g. permission denied).
    pub async fn get(&self, method: &str, url: &str) -> Result<Option<CachedExchange>, CacheError> {
        let key = CacheKey::new(method, url);
        let path = self.record_path(&key);

        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(%key, "no cache record");
                return Ok(None);
            }
            Err(source) => return Err(CacheError::Read { path, source }),
        };

        match serde_json::from_slice::<CachedExchange>(&raw) {
            Ok(exchange) => {
                debug!(%key, status = exchange.status, "cache record loaded");
                Ok(Some(exchange))
            }
            Err(e) => {
                warn!(%key, path = %path.display(), error = %e, "ignoring unreadable cache record");
                Ok(None)
            }
        }
    }

    /// Stores `exchange` for `method` and `url`, replacing any previous record.
    ///
    /// The record is written to a temporary file, flushed to disk, and renamed
    /// into place, so a concurrent [`get`](Self::get) sees either the old
    /// record or the new one.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Write`] if the record could not be written.
    pub async fn set(&self, method: &str, url: &str, exchange: &CachedExchange) -> Result<(), CacheError> {
        let key = CacheKey::new(method, url);
        let path = self.record_path(&key);
        let payload = serde_json::to_vec(exchange)?;

        let tmp = self.root.join(format!(
            ".{key}.{}.{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(source) = write_synced(&tmp, &payload).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(CacheError::Write { path: tmp, source });
        }
        if let Err(source) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(CacheError::Write { path, source });
        }

        debug!(%key, status = exchange.status, bytes = exchange.body.len(), "cache record stored");
        Ok(())
    }

    /// Removes every record and leaves an empty, usable store.
    ///
    /// The root is moved aside and recreated before the old contents are
    /// deleted, so it never disappears on the happy path. If the move fails
    /// (for instance when the root is a mount point) the contents are deleted
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Clear`] if records could not be removed, or
    /// [`CacheError::CreateDir`] if the root could not be recreated.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let trash = self.trash_path();

        match fs::rename(&self.root, &trash).await {
            Ok(()) => {
                create_root(&self.root).await?;
                fs::remove_dir_all(&trash)
                    .await
                    .map_err(|source| CacheError::Clear { path: trash, source })?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                create_root(&self.root).await?;
            }
            Err(e) => {
                debug!(error = %e, "cannot move cache root aside; clearing in place");
                self.clear_in_place().await?;
            }
        }

        info!(root = %self.root.display(), "cache cleared");
        Ok(())
    }

    fn trash_path(&self) -> PathBuf {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_DIR_NAME.to_owned());
        self.root.with_file_name(format!(
            ".{name}.trash-{}-{}",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ))
    }

    async fn clear_in_place(&self) -> Result<(), CacheError> {
        let clear_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| CacheError::Clear { path, source }
        };

        let mut entries = fs::read_dir(&self.root).await.map_err(clear_err(&self.root))?;
        while let Some(entry) = entries.next_entry().await.map_err(clear_err(&self.root))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(clear_err(&path))?;
            let removed = if file_type.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            removed.map_err(clear_err(&path))?;
        }
        Ok(())
    }
}

async fn create_root(root: &Path) -> Result<(), CacheError> {
    fs::create_dir_all(root)
        .await
        .map_err(|source| CacheError::CreateDir {
            path: root.to_path_buf(),
            source,
        })
}

async fn write_synced(path: &Path, payload: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(payload).await?;
    file.sync_all().await
}
