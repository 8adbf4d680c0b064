//! The proxy request handler.
//!
//! Each request moves through
//! `validate → (reject | cache hit | fetch) → relay`:
//! - a missing or malformed `url` parameter is answered with 400 and a JSON
//!   list of problems, without touching cache or network
//! - a cache hit is relayed straight away
//! - a miss suspends on `Upstream::fetch` (no thread is held while the
//!   upstream works) and resumes with the published outcome

use std::time::Instant;

use axum::extract::{RawQuery, State};
use axum::http::header::ALLOW;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use url::Url;

use crate::cache::CacheKey;
use crate::observability::metrics;

use super::request::{parse_target, target_param, RequestIdExt, UrlProblem, URL_PARAM};
use super::response::{relay, Relay};
use super::server::AppState;

#[derive(Debug, Serialize)]
struct Rejection {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    problems: Vec<String>,
}

/// `GET /?url=<target>`.
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let request_id = headers.request_id().to_owned();

    // The GET route also receives HEAD.
    if method != Method::GET {
        tracing::debug!(request_id = %request_id, %method, "Refusing non-GET request");
        metrics::record_request(405, "rejected", start);
        return method_not_allowed();
    }

    // 1. Validate
    let Some(raw) = target_param(query.as_deref()) else {
        tracing::debug!(request_id = %request_id, "Missing url parameter");
        metrics::record_request(400, "rejected", start);
        return missing_parameter();
    };
    let url = match parse_target(&raw) {
        Ok(url) => url,
        Err(problems) => {
            tracing::debug!(request_id = %request_id, url = %raw, ?problems, "Rejecting invalid url");
            metrics::record_request(400, "rejected", start);
            return invalid_url(&problems);
        }
    };

    let key = CacheKey::new(url);
    let base = state.proxy_base(&headers);

    // 2. Serve from cache
    if let Some(entry) = state.cache.lookup(&key) {
        tracing::debug!(request_id = %request_id, url = %key, "Cache hit");
        metrics::record_request(entry.status.as_u16(), "hit", start);
        return relay(Relay::from(entry), &base);
    }

    // 3. Fetch; the request is suspended here until the fetch task publishes
    tracing::debug!(request_id = %request_id, url = %key, "Cache miss, fetching upstream");
    let outcome = state.upstream.fetch(&key).await;

    // 4. Relay
    let relay_value = Relay::from(outcome);
    tracing::info!(
        request_id = %request_id,
        url = %key,
        status = relay_value.status.as_u16(),
        bytes = relay_value.body.len(),
        elapsed = ?start.elapsed(),
        "Relaying upstream response"
    );
    metrics::record_request(relay_value.status.as_u16(), "miss", start);
    relay(relay_value, &base)
}

fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(ALLOW, HeaderValue::from_static("GET"))],
    )
        .into_response()
}

fn missing_parameter() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(Rejection {
            error: format!("missing required url parameter: {URL_PARAM}"),
            problems: Vec::new(),
        }),
    )
        .into_response()
}

fn invalid_url(problems: &[UrlProblem]) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(Rejection {
            error: "invalid url".to_string(),
            problems: problems.iter().map(ToString::to_string).collect(),
        }),
    )
        .into_response()
}

/// Base URL of this proxy as seen by the client.
pub(crate) fn base_from_host(headers: &HeaderMap) -> Option<Url> {
    let host = headers.get(axum::http::header::HOST)?.to_str().ok()?;
    Url::parse(&format!("http://{host}/")).ok()
}
