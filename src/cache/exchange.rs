//! The persisted unit of the cache.

use serde::{Deserialize, Serialize};

use crate::http::Headers;

/// One complete upstream response, as stored and replayed.
///
/// `reason` is the origin's own phrase when it sent a non-standard one.
/// Header names are lowercase because the upstream client normalises them,
/// and values that are not valid UTF-8 are stored lossily. Order and repeated
/// fields are kept.
///
/// Persisted as JSON with the body base64-encoded:
///
/// ```json
/// {"status":200,"reason":"OK","headers":[["Content-Type","text/plain"]],"body":"aGk="}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedExchange {
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
}

mod base64_body {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub(super) fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(de::Error::custom)
    }
}
