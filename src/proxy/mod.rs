//! Cache-aware request handling.
//!
//! [`ProxyHandler`] is built once per server and shared by every connection
//! task. For each request it resolves the upstream URL, serves GETs from the
//! [`CacheStore`] when it can, and otherwise forwards live through the
//! [`Forwarder`], storing GET responses on the way back.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::cache::{CacheStore, CachedExchange};
use crate::http::{Method, Request, Response, StatusCode, is_hop_by_hop};

mod forward;
mod target;

pub use forward::{ForwardError, Forwarder};
pub use target::resolve_target;

/// Response header carrying the [`CacheStatus`].
pub const CACHE_HEADER: &str = "X-Cache";

/// Whether a response came from the store or from the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// Only GET responses are stored and replayed.
pub fn is_cacheable(method: &Method) -> bool {
    matches!(method, Method::Get)
}

/// Handles one request at a time against a single origin.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use caching_proxy::cache::CacheStore;
/// use caching_proxy::proxy::{Forwarder, ProxyHandler};
/// use caching_proxy::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let cache = Arc::new(CacheStore::open("/tmp/proxy-cache").await?);
///     let forwarder = Forwarder::new(Duration::from_secs(30), true)?;
///     let handler = Arc::new(ProxyHandler::new("http://example.com", cache, forwarder));
///
///     let server = Server::bind("0.0.0.0:3000").await?;
///     server
///         .run(move |req| {
///             let handler = Arc::clone(&handler);
///             async move { handler.handle(req).await }
///         })
///         .await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct ProxyHandler {
    origin: String,
    cache: Arc<CacheStore>,
    forwarder: Forwarder,
}

impl ProxyHandler {
    pub fn new(origin: impl Into<String>, cache: Arc<CacheStore>, forwarder: Forwarder) -> Self {
        Self {
            origin: origin.into(),
            cache,
            forwarder,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Produces the response for `request`, annotated with [`CACHE_HEADER`].
    ///
    /// Never fails: upstream transport errors become `502`/`504` responses
    /// and cache problems degrade to a live forward.
    pub async fn handle(&self, request: Request) -> Response {
        let started = Instant::now();
        let target = resolve_target(&self.origin, request.target());

        let (response, cache_status) = self.dispatch(&request, &target).await;

        info!(
            method = %request.method(),
            url = %target,
            status = response.status(),
            cache = cache_status.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request handled"
        );
        response
    }

    async fn dispatch(&self, request: &Request, target: &str) -> (Response, CacheStatus) {
        let method = request.method();

        if *method == Method::Connect {
            let response = local_response(
                StatusCode::NotImplemented,
                "CONNECT tunnelling is not supported",
            );
            return (response, CacheStatus::Miss);
        }

        let cacheable = is_cacheable(method);
        if cacheable {
            match self.cache.get(method.as_str(), target).await {
                Ok(Some(exchange)) => {
                    return (relay(exchange, CacheStatus::Hit), CacheStatus::Hit);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, url = target, "cache lookup failed; forwarding"),
            }
        }

        let exchange = match self.forwarder.forward(request, target).await {
            Ok(exchange) => exchange,
            Err(e) => {
                warn!(error = %e, url = target, "forwarding failed");
                return (gateway_error(&e), CacheStatus::Miss);
            }
        };

        if cacheable {
            if let Err(e) = self.cache.set(method.as_str(), target, &exchange).await {
                error!(error = %e, url = target, "failed to store response in cache");
            }
        }

        (relay(exchange, CacheStatus::Miss), CacheStatus::Miss)
    }
}

/// Builds the client-facing response for a stored or freshly fetched exchange.
///
/// Hop-by-hop headers and `Content-Length` are dropped; the transport writes a
/// fresh `Content-Length` for the actual body.
fn relay(exchange: CachedExchange, cache_status: CacheStatus) -> Response {
    let CachedExchange {
        status,
        reason,
        headers,
        body,
    } = exchange;

    let mut response = Response::relayed(status, reason);
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name) || name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        response.add_header(name, value);
    }
    response.add_header(CACHE_HEADER, cache_status.as_str());
    response.body_bytes(body)
}

fn gateway_error(err: &ForwardError) -> Response {
    let status = match err {
        ForwardError::Timeout { .. } => StatusCode::GatewayTimeout,
        ForwardError::InvalidTarget { .. } | ForwardError::InvalidMethod(_) => {
            StatusCode::BadRequest
        }
        ForwardError::Client(_) | ForwardError::Transport { .. } => StatusCode::BadGateway,
    };
    local_response(status, &err.to_string())
}

fn local_response(status: StatusCode, message: &str) -> Response {
    Response::new(status)
        .header(CACHE_HEADER, CacheStatus::Miss.as_str())
        .body(format!("{message}\n"))
}
