//! Wires the store, forwarder and handler onto a listener.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::cache::{CacheError, CacheStore};
use crate::config::ProxyConfig;
use crate::proxy::{ForwardError, Forwarder, ProxyHandler};
use crate::server::{Server, ServerError};

/// Errors that stop the proxy from starting or running.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// A bound, ready-to-run proxy.
pub struct Proxy {
    server: Server,
    handler: Arc<ProxyHandler>,
}

impl Proxy {
    /// Opens the cache, builds the upstream client and binds the listener.
    pub async fn bind(config: &ProxyConfig) -> Result<Self, RunError> {
        let cache = Arc::new(CacheStore::open(&config.cache_dir).await?);
        let forwarder = Forwarder::new(config.upstream_timeout, config.follow_redirects)?;
        let handler = Arc::new(ProxyHandler::new(config.origin.clone(), cache, forwarder));
        let server = Server::bind(config.listen.to_string()).await?;

        info!(
            address = %server.local_addr(),
            origin = %config.origin,
            cache_dir = %config.cache_dir.display(),
            "proxy bound"
        );
        Ok(Self { server, handler })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Serves requests until `shutdown` resolves.
    pub async fn run_until<S>(self, shutdown: S) -> Result<(), RunError>
    where
        S: Future<Output = ()>,
    {
        let handler = self.handler;
        self.server
            .run_until(
                move |request| {
                    let handler = Arc::clone(&handler);
                    async move { handler.handle(request).await }
                },
                shutdown,
            )
            .await?;
        Ok(())
    }
}
