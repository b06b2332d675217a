//! Validated runtime configuration.
//!
//! [`Action::from_cli`] turns parsed arguments into either a cache purge or a
//! fully validated [`ProxyConfig`]. Nothing here touches the network or the
//! filesystem.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::cache::{self, CacheError};
use crate::cli::Cli;

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("use --port and --origin to start the server, or --clear-cache to clear the cache")]
    MissingArguments,

    #[error("--origin must be a valid http/https URL (got '{origin}': {reason})")]
    InvalidOrigin { origin: String, reason: String },

    #[error(transparent)]
    CacheDir(#[from] CacheError),
}

/// What the process should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Purge the store at this directory and exit.
    ClearCache(PathBuf),
    Serve(ProxyConfig),
}

/// Everything needed to run the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub listen: SocketAddr,
    pub origin: String,
    pub cache_dir: PathBuf,
    pub upstream_timeout: Duration,
    pub follow_redirects: bool,
}

impl Action {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let cache_dir = match &cli.cache_dir {
            Some(dir) => dir.clone(),
            None => cache::default_dir()?,
        };

        if cli.clear_cache {
            return Ok(Self::ClearCache(cache_dir));
        }

        let (Some(port), Some(origin)) = (cli.port, cli.origin.as_deref()) else {
            return Err(ConfigError::MissingArguments);
        };
        validate_origin(origin)?;

        Ok(Self::Serve(ProxyConfig {
            listen: SocketAddr::new(cli.host, port),
            origin: origin.to_owned(),
            cache_dir,
            upstream_timeout: Duration::from_secs(cli.timeout),
            follow_redirects: !cli.no_follow_redirects,
        }))
    }
}

/// Accepts absolute `http`/`https` URLs with a host.
pub fn validate_origin(origin: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidOrigin {
        origin: origin.to_owned(),
        reason: reason.to_owned(),
    };

    let url = Url::parse(origin).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(())
}
