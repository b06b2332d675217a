#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use caching_proxy::{Headers, Method, Proxy, ProxyConfig, Request, Response, Server, StatusCode};

/// A request as the origin saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub target: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

#[derive(Default)]
struct OriginState {
    hits: AtomicUsize,
    seen: Mutex<Vec<Recorded>>,
}

/// In-process origin that counts and records every request it serves.
///
/// Routes:
/// - `/items`: `items N` where N is the origin's request count, plus a few
///   hop-by-hop and repeated headers
/// - `/missing`: 404
/// - `/binary`: bytes `0..=255`
/// - `/echo`: the request body
/// - `/fine`: 200 with the reason `Fine Thanks`
/// - `/odd`: an unregistered 599 with the reason `Custom Failure`
/// - anything else: `METHOD TARGET`
pub struct Origin {
    pub addr: SocketAddr,
    state: Arc<OriginState>,
}

impl Origin {
    pub async fn start() -> Self {
        let server = Server::bind("127.0.0.1:0").await.expect("bind origin");
        let addr = server.local_addr();
        let state = Arc::new(OriginState::default());

        let shared = Arc::clone(&state);
        tokio::spawn(server.run(move |req: Request| {
            let state = Arc::clone(&shared);
            async move { serve(&state, req) }
        }));

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.seen.lock().unwrap().clone()
    }
}

fn serve(state: &OriginState, req: Request) -> Response {
    let n = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    state.seen.lock().unwrap().push(Recorded {
        method: req.method().to_string(),
        target: req.target().to_owned(),
        headers: req.headers().clone(),
        body: req.body().to_vec(),
    });

    let response = match req.path() {
        "/items" => Response::new(StatusCode::Ok)
            .header("Keep-Alive", "timeout=5")
            .header("Proxy-Connection", "keep-alive")
            .header("X-Multi", "a")
            .header("X-Multi", "b")
            .body(format!("items {n}")),
        "/missing" => Response::new(StatusCode::NotFound).body("no such item"),
        "/binary" => Response::new(StatusCode::Ok)
            .header("Content-Type", "application/octet-stream")
            .body_bytes((0..=255u8).collect::<Vec<_>>()),
        "/echo" => Response::new(StatusCode::Ok).body_bytes(req.body().to_vec()),
        "/fine" => Response::relayed(200, "Fine Thanks").body("fine"),
        "/odd" => Response::relayed(599, "Custom Failure").body("odd"),
        _ => Response::new(StatusCode::Ok).body(format!("{} {}", req.method(), req.target())),
    };

    // HEAD replies must not carry a body on a persistent connection.
    if *req.method() == Method::Head {
        response.body_bytes(Vec::new())
    } else {
        response
    }
}

/// An origin URL nothing is listening on.
pub fn dead_origin() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind scratch listener");
    let addr = listener.local_addr().expect("scratch listener addr");
    drop(listener);
    format!("http://{addr}")
}

/// Starts a proxy on an ephemeral port and returns its address.
pub async fn start_proxy(origin: &str, cache_dir: &Path) -> SocketAddr {
    let config = ProxyConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        origin: origin.to_owned(),
        cache_dir: cache_dir.to_path_buf(),
        upstream_timeout: Duration::from_secs(5),
        follow_redirects: true,
    };
    let proxy = Proxy::bind(&config).await.expect("bind proxy");
    let addr = proxy.local_addr();
    tokio::spawn(proxy.run_until(std::future::pending::<()>()));
    addr
}

/// A response read off the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends `raw` on a fresh connection and reads exactly one response,
/// framed by its `Content-Length`.
pub async fn send(addr: SocketAddr, raw: &[u8]) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(raw).await.expect("write request");

    tokio::time::timeout(Duration::from_secs(10), read_response(&mut stream))
        .await
        .expect("response within 10s")
}

/// `GET` through the proxy with only a `Host` header.
pub async fn get(addr: SocketAddr, target: &str) -> RawResponse {
    let raw = format!("GET {target} HTTP/1.1\r\nHost: {addr}\r\n\r\n");
    send(addr, raw.as_bytes()).await
}

async fn read_response(stream: &mut TcpStream) -> RawResponse {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).await.expect("read response");
        assert!(n > 0, "connection closed before a full response arrived");
        buf.extend_from_slice(&chunk[..n]);

        let mut slots = [httparse::EMPTY_HEADER; 64];
        let mut parsed = httparse::Response::new(&mut slots);
        let httparse::Status::Complete(offset) = parsed.parse(&buf).expect("valid response")
        else {
            continue;
        };

        let headers: Vec<(String, String)> = parsed
            .headers
            .iter()
            .map(|h| {
                (
                    h.name.to_owned(),
                    String::from_utf8_lossy(h.value).into_owned(),
                )
            })
            .collect();
        let length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .map(|(_, v)| v.parse::<usize>().expect("numeric content-length"))
            .unwrap_or(0);

        if buf.len() < offset + length {
            continue;
        }

        return RawResponse {
            status: parsed.code.expect("status code"),
            reason: parsed.reason.unwrap_or_default().to_owned(),
            headers,
            body: buf[offset..offset + length].to_vec(),
        };
    }
}
