//! Request-head parsing on top of [`httparse`].

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

/// Why a buffer does not (yet) hold a usable request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request head is incomplete")]
    Incomplete,

    #[error("malformed request: {0}")]
    Parse(#[from] httparse::Error),

    #[error("request line has no {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length value '{value}'")]
    InvalidContentLength { value: String },
}

/// A fully parsed HTTP/1.1 request.
///
/// Created by [`Request::parse`] from a raw byte buffer. The body holds at most
/// `Content-Length` bytes; anything after it belongs to the next request on
/// the connection.
///
/// # Examples
///
/// ```
/// use caching_proxy::http::request::Request;
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.target(), "/hello?name=world");
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    /// The request-target exactly as sent: origin-form with its query string,
    /// or absolute-form when the client talks to us as a forward proxy.
    target: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    content_length: Option<usize>,
    body: Bytes,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// Parses the request at the start of `buf`.
    ///
    /// Returns the request and the offset of its first body byte. The body
    /// may be shorter than `Content-Length` if `buf` ends early; callers
    /// compare against [`content_length`](Self::content_length) before
    /// dispatching.
    ///
    /// # Errors
    ///
    /// [`RequestError::Incomplete`] until the blank line ending the head has
    /// arrived. A `Content-Length` that is not a decimal integer is
    /// [`RequestError::InvalidContentLength`].
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut slots = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut slots);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = match raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse()
        {
            Ok(method) => method,
            Err(never) => match never {},
        };

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?
            .to_owned();

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        // Fields with non-UTF-8 values are dropped rather than mangled.
        let headers: Headers = raw_req
            .headers
            .iter()
            .filter_map(|h| Some((h.name, std::str::from_utf8(h.value).ok()?)))
            .collect();

        let content_length = match headers.get("content-length") {
            Some(value) => Some(value.trim().parse::<usize>().map_err(|_| {
                RequestError::InvalidContentLength {
                    value: value.to_owned(),
                }
            })?),
            None => None,
        };

        let body_end = buf
            .len()
            .min(body_offset.saturating_add(content_length.unwrap_or(0)));
        let body = Bytes::copy_from_slice(&buf[body_offset..body_end]);

        Ok((
            Self {
                method,
                target,
                version,
                headers,
                content_length,
                body,
            },
            body_offset,
        ))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request-target as received, query string included.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The target up to any `?`.
    pub fn path(&self) -> &str {
        match self.target.find('?') {
            Some(pos) => &self.target[..pos],
            None => &self.target,
        }
    }

    /// Minor version: `0` for HTTP/1.0, `1` for HTTP/1.1.
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Whether the client expects the connection to stay open afterwards.
    ///
    /// An explicit `Connection` field decides; otherwise HTTP/1.1 persists and
    /// HTTP/1.0 does not.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Declared body length, if the client sent one.
    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }
}
