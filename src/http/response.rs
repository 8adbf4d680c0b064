//! Response relay.
//!
//! # Responsibilities
//! - Turn a cached entry or fetch outcome into the client response
//! - Drop headers the serving side owns (`Content-Length`, `Server`,
//!   `Date`, `Connection`) and the upstream framing (`Transfer-Encoding`),
//!   which no longer applies once the body is buffered
//! - Rewrite `Location` so redirects stay inside the proxy
//! - Always close the inbound connection after the response
//!
//! # Design Decisions
//! - Bodies are fully buffered and sent with an explicit `Content-Length`;
//!   no chunked relay
//! - A relative `Location` is wrapped as-is. It will not validate when the
//!   client follows it; absolute values are the only ones that round-trip.

use axum::body::Body;
use axum::http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use url::Url;

use crate::cache::{CacheEntry, HeaderList};
use crate::fetch::{ErrorResponse, FetchOutcome};

use super::request::URL_PARAM;

/// Upstream headers that never reach the client.
const DROPPED_HEADERS: [&str; 5] = [
    "content-length",
    "server",
    "date",
    "connection",
    "transfer-encoding",
];

/// Everything needed to write one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay {
    pub status: StatusCode,
    pub reason: Option<String>,
    pub headers: HeaderList,
    pub body: Bytes,
}

impl From<CacheEntry> for Relay {
    fn from(entry: CacheEntry) -> Self {
        Self {
            status: entry.status,
            reason: entry.reason,
            headers: entry.headers,
            body: entry.body,
        }
    }
}

impl From<ErrorResponse> for Relay {
    fn from(err: ErrorResponse) -> Self {
        let mut headers = err.headers;
        if headers.get(CONTENT_TYPE.as_str()).is_none() {
            headers.push(
                CONTENT_TYPE.as_str(),
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
        }
        Self {
            status: err.status,
            reason: None,
            headers,
            body: Bytes::from(err.message),
        }
    }
}

impl From<FetchOutcome> for Relay {
    fn from(outcome: FetchOutcome) -> Self {
        match outcome {
            FetchOutcome::Success(entry) => entry.into(),
            FetchOutcome::Error(err) => err.into(),
        }
    }
}

/// Build the client response. `base` is the proxy's own URL, used for
/// `Location` rewriting.
pub fn relay(relay: Relay, base: &Url) -> Response {
    let content_length = relay.body.len();
    // Empty bodies get no body stream at all.
    let body = if relay.body.is_empty() {
        Body::empty()
    } else {
        Body::from(relay.body)
    };

    let mut response = Response::new(body);
    *response.status_mut() = relay.status;
    if let Some(reason) = relay
        .reason
        .as_deref()
        .and_then(|r| hyper::ext::ReasonPhrase::try_from(r.as_bytes()).ok())
    {
        response.extensions_mut().insert(reason);
    }

    let headers = response.headers_mut();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));

    for (name, value) in relay.headers.iter() {
        if DROPPED_HEADERS.iter().any(|d| name.eq_ignore_ascii_case(d)) {
            continue;
        }
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::debug!(header = %name, "Skipping unrepresentable upstream header");
            continue;
        };
        if header_name == axum::http::header::LOCATION {
            match rewrite_location(base, value) {
                Some(rewritten) => headers.append(header_name, rewritten),
                None => headers.append(header_name, value.clone()),
            };
            continue;
        }
        headers.append(header_name, value.clone());
    }

    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    response
}

/// Point `location` back at the proxy: `<base>?url=<location>`.
pub fn rewrite_location(base: &Url, location: &HeaderValue) -> Option<HeaderValue> {
    let original = String::from_utf8_lossy(location.as_bytes());
    let mut proxied = base.clone();
    proxied.set_query(None);
    proxied.set_fragment(None);
    proxied
        .query_pairs_mut()
        .append_pair(URL_PARAM, &original);
    HeaderValue::from_str(proxied.as_str()).ok()
}
