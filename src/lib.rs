//! # caching-proxy
//!
//! A transparent HTTP forwarding proxy with a persistent response cache.
//!
//! GET responses are stored on disk keyed by method and target URL and
//! replayed on later requests without contacting the origin. Every other
//! method is forwarded live. Each response carries `X-Cache: HIT` or
//! `X-Cache: MISS`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use caching_proxy::{Proxy, ProxyConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProxyConfig {
//!         listen: "0.0.0.0:3000".parse()?,
//!         origin: "http://dummyjson.com".to_owned(),
//!         cache_dir: "/tmp/caching-proxy".into(),
//!         upstream_timeout: Duration::from_secs(30),
//!         follow_redirects: true,
//!     };
//!     let proxy = Proxy::bind(&config).await?;
//!     proxy.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod http;
pub mod logging;
pub mod proxy;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::{Proxy, RunError};
pub use cache::{CacheStore, CachedExchange};
pub use config::{Action, ProxyConfig};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use proxy::{CacheStatus, ProxyHandler};
pub use server::{Server, ServerError};
