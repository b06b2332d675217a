//! HTTP/1.1 protocol types and parsing.
//!
//! Just enough of the protocol for a forwarding proxy: requests are parsed
//! with `httparse`, responses are serialized by hand.

use std::fmt;

pub mod headers;
pub mod request;
pub mod response;

pub use headers::{Headers, is_hop_by_hop};
pub use request::Request;
pub use response::Response;

macro_rules! status_codes {
    ($($name:ident = $code:literal $reason:literal,)+) => {
        /// Status codes the proxy produces on its own.
        ///
        /// Relayed upstream responses carry arbitrary numeric codes and are
        /// built with [`Response::relayed`] instead.
        ///
        /// # Examples
        ///
        /// ```
        /// use caching_proxy::http::StatusCode;
        ///
        /// let status = StatusCode::BadGateway;
        /// assert_eq!(status.as_u16(), 502);
        /// assert_eq!(status.canonical_reason(), "Bad Gateway");
        /// ```
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum StatusCode {
            $($name = $code,)+
        }

        impl StatusCode {
            pub fn as_u16(self) -> u16 {
                self as u16
            }

            pub fn canonical_reason(self) -> &'static str {
                match self {
                    $(Self::$name => $reason,)+
                }
            }
        }
    };
}

status_codes! {
    Ok = 200 "OK",
    NoContent = 204 "No Content",
    BadRequest = 400 "Bad Request",
    NotFound = 404 "Not Found",
    PayloadTooLarge = 413 "Payload Too Large",
    NotImplemented = 501 "Not Implemented",
    BadGateway = 502 "Bad Gateway",
    GatewayTimeout = 504 "Gateway Timeout",
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

macro_rules! methods {
    ($($name:ident $token:literal,)+) => {
        /// A request method as it appeared on the request line.
        ///
        /// Tokens are case-sensitive: `get` is an extension method, not `GET`.
        ///
        /// ```
        /// use caching_proxy::http::Method;
        ///
        /// let method: Method = "GET".parse().unwrap();
        /// assert_eq!(method, Method::Get);
        /// assert_eq!("PURGE".parse::<Method>().unwrap().as_str(), "PURGE");
        /// ```
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Method {
            $($name,)+
            Extension(String),
        }

        impl Method {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$name => $token,)+
                    Self::Extension(token) => token,
                }
            }
        }

        impl std::str::FromStr for Method {
            type Err = std::convert::Infallible;

            fn from_str(token: &str) -> Result<Self, Self::Err> {
                Ok(match token {
                    $($token => Self::$name,)+
                    other => Self::Extension(other.to_owned()),
                })
            }
        }
    };
}

methods! {
    Get "GET",
    Head "HEAD",
    Post "POST",
    Put "PUT",
    Patch "PATCH",
    Delete "DELETE",
    Options "OPTIONS",
    Trace "TRACE",
    Connect "CONNECT",
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_round_trip_through_their_token() {
        for token in ["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "TRACE", "CONNECT"] {
            let method: Method = token.parse().unwrap();
            assert!(!matches!(method, Method::Extension(_)), "{token}");
            assert_eq!(method.to_string(), token);
        }
    }

    #[test]
    fn method_tokens_are_case_sensitive() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Extension("get".to_owned()));
        assert_eq!("PURGE".parse::<Method>().unwrap().as_str(), "PURGE");
    }

    #[test]
    fn status_display() {
        assert_eq!(StatusCode::GatewayTimeout.to_string(), "504 Gateway Timeout");
        assert_eq!(u16::from(StatusCode::NotImplemented), 501);
    }
}
