//! Responses written back to the client.
//!
//! Framing is owned here: every response is sent with a single
//! `Content-Length` computed from the body actually written, never chunked.

use std::borrow::Cow;

use bytes::{BufMut, BytesMut};

use super::{Headers, StatusCode};

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use caching_proxy::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: u16,
    reason: Cow<'static, str>,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self::with_reason(status.as_u16(), status.canonical_reason())
    }

    /// Creates a response with an arbitrary status code and reason phrase.
    ///
    /// Used for replaying upstream responses, whose codes and phrases are
    /// written verbatim. The reason may be empty.
    pub fn relayed(status: u16, reason: impl Into<String>) -> Self {
        Self::with_reason(status, reason.into())
    }

    fn with_reason(status: u16, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets the response body from a string.
    ///
    /// Adds `Content-Type: text/plain; charset=utf-8` unless a `Content-Type`
    /// header was already set. The `Content-Length` header is written
    /// automatically by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        if !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }
        self.body = body.into().into_bytes();
        self
    }

    /// Sets the response body from raw bytes. No headers are added.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Controls whether the connection is kept open after this response.
    ///
    /// A `Connection: close` header is written when keep-alive is disabled.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the numeric status code of this response.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the reason phrase written on the status line.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns the headers set so far, excluding the framing headers added on
    /// serialization.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body bytes.
    pub fn payload(&self) -> &[u8] {
        &self.body
    }

    /// Wire bytes for this response.
    ///
    /// `Connection: close` is added only when keep-alive was turned off, and
    /// `Content-Length` always comes last.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if !self.keep_alive {
            self.headers.insert("Connection", "close");
        }

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Status line. The space before the reason is required even when
        // the reason is empty.
        buf.put(format!("HTTP/1.1 {} {}\r\n", self.status, self.reason).as_bytes());

        buf.put(self.headers.to_string().as_bytes());

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());

        // Header/body separator
        buf.put(&b"\r\n"[..]);

        // Body
        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}
