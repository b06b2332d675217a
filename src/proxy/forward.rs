//! Outbound call to the origin.

use std::time::Duration;

use hyper::ext::ReasonPhrase;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect;
use thiserror::Error;
use tracing::debug;

use crate::cache::CachedExchange;
use crate::http::{Headers, Request, is_hop_by_hop};

/// Errors that prevent an upstream response from being obtained.
///
/// An upstream 4xx/5xx is not an error; it is captured like any other
/// response.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build upstream client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("method {0} cannot be forwarded")]
    InvalidMethod(String),

    #[error("invalid upstream URL {url}: {source}")]
    InvalidTarget {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("upstream request to {url} timed out")]
    Timeout { url: String },

    #[error("upstream request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Sends requests to the origin and captures complete responses.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    /// Builds a forwarder whose calls are bounded by `timeout`.
    ///
    /// With `follow_redirects` off, 3xx responses are relayed to the client
    /// instead of being followed.
    pub fn new(timeout: Duration, follow_redirects: bool) -> Result<Self, ForwardError> {
        let policy = if follow_redirects {
            redirect::Policy::default()
        } else {
            redirect::Policy::none()
        };
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(policy)
            .build()
            .map_err(ForwardError::Client)?;
        Ok(Self { client })
    }

    /// Forwards `request` to `url` with the same method, headers and body.
    ///
    /// `Host`, `Content-Length` and hop-by-hop headers are not copied; the
    /// client recomputes the first two for the new target. A body is sent
    /// only when the request declared a nonzero `Content-Length`.
    pub async fn forward(&self, request: &Request, url: &str) -> Result<CachedExchange, ForwardError> {
        let target = url::Url::parse(url).map_err(|source| ForwardError::InvalidTarget {
            url: url.to_owned(),
            source,
        })?;
        let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
            .map_err(|_| ForwardError::InvalidMethod(request.method().to_string()))?;

        let mut builder = self
            .client
            .request(method, target)
            .headers(outbound_headers(request.headers()));
        if request.content_length().unwrap_or(0) > 0 {
            builder = builder.body(request.body().clone());
        }

        let response = builder.send().await.map_err(|e| transport_error(url, e))?;

        let status = response.status();
        // hyper keeps the phrase only when it differs from the canonical one.
        let reason = match response.extensions().get::<ReasonPhrase>() {
            Some(phrase) => String::from_utf8_lossy(phrase.as_bytes()).into_owned(),
            None => status.canonical_reason().unwrap_or_default().to_owned(),
        };
        let mut headers = Headers::with_capacity(response.headers().len());
        for (name, value) in response.headers() {
            headers.insert(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        let body = response.bytes().await.map_err(|e| transport_error(url, e))?;

        debug!(url, status = status.as_u16(), bytes = body.len(), "upstream responded");
        Ok(CachedExchange {
            status: status.as_u16(),
            reason,
            headers,
            body: body.to_vec(),
        })
    }
}

fn outbound_headers(inbound: &Headers) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound.iter() {
        if name.eq_ignore_ascii_case("host")
            || name.eq_ignore_ascii_case("content-length")
            || is_hop_by_hop(name)
        {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => debug!(header = name, "skipping header that cannot be forwarded"),
        }
    }
    headers
}

fn transport_error(url: &str, source: reqwest::Error) -> ForwardError {
    if source.is_timeout() {
        ForwardError::Timeout {
            url: url.to_owned(),
        }
    } else {
        ForwardError::Transport {
            url: url.to_owned(),
            source,
        }
    }
}
