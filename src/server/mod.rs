//! The listener the proxy is served from.
//!
//! One Tokio task per accepted connection. Each task frames requests off the
//! socket by `Content-Length`, hands them to the handler one at a time and
//! writes the responses back in order, so pipelined requests are answered
//! in sequence.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Upper bound on a buffered request, head and body together.
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

const INITIAL_BUF_SIZE: usize = 4096;

/// A bound HTTP/1.1 listener.
///
/// ```rust,no_run
/// use caching_proxy::server::Server;
/// use caching_proxy::http::{Request, Response, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(|req: Request| async move {
///         Response::new(StatusCode::Ok).body(format!("you asked for {}", req.target()))
///     }).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// # Errors
    ///
    /// [`ServerError::Bind`] when the address is taken or not permitted.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// The bound address; useful after binding port `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves forever. See [`run_until`](Self::run_until).
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.run_until(handler, std::future::pending::<()>()).await
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// `handler` is shared by every connection task. Connections already
    /// accepted keep being served after the listener stops.
    pub async fn run_until<H, F, S>(self, handler: H, shutdown: S) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
        S: Future<Output = ()>,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "listening");

        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                () = &mut shutdown => {
                    info!(address = %self.local_addr, "shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(%peer, "connection accepted");
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, peer, handler).await {
                    warn!(%peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Outcome of looking at the bytes buffered so far.
enum Frame {
    /// A complete request occupying the first `len` buffered bytes.
    Ready { request: Request, len: usize },
    NeedMore,
    Reject(StatusCode, String),
}

fn frame(buf: &[u8]) -> Frame {
    let (request, body_offset) = match Request::parse(buf) {
        Ok(parsed) => parsed,
        Err(RequestError::Incomplete) if buf.len() > MAX_REQUEST_SIZE => {
            return Frame::Reject(StatusCode::PayloadTooLarge, "Request head too large".into());
        }
        Err(RequestError::Incomplete) => return Frame::NeedMore,
        Err(e) => return Frame::Reject(StatusCode::BadRequest, format!("Bad Request: {e}")),
    };

    let len = body_offset.saturating_add(request.content_length().unwrap_or(0));
    if len > MAX_REQUEST_SIZE {
        return Frame::Reject(StatusCode::PayloadTooLarge, "Request entity too large".into());
    }
    if buf.len() < len {
        return Frame::NeedMore;
    }
    Frame::Ready { request, len }
}

async fn serve_connection<H, F>(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<H>,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let (request, len) = match frame(&buf) {
            Frame::Ready { request, len } => (request, len),
            Frame::NeedMore => {
                if stream.read_buf(&mut buf).await? == 0 {
                    if !buf.is_empty() {
                        debug!(%peer, buffered = buf.len(), "peer closed mid-request");
                    }
                    return Ok(());
                }
                continue;
            }
            Frame::Reject(status, message) => {
                warn!(%peer, status = status.as_u16(), %message, "rejecting request");
                let response = Response::new(status).body(message).keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                return stream.flush().await;
            }
        };

        let keep_alive = request.is_keep_alive();
        debug!(%peer, method = %request.method(), target = request.target(), "dispatching");

        let response = handler(request).await.keep_alive(keep_alive);
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        let _ = buf.split_to(len);

        if !keep_alive {
            return Ok(());
        }
    }
}
