//! Request handling and validation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Extract the `url` query parameter
//! - Validate it as an absolute http(s) URL, collecting every problem
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Validation never touches the network or the cache

use axum::http::{HeaderMap, HeaderValue, Request};
use thiserror::Error;
use tower_http::request_id::{MakeRequestId, RequestId};
use url::{form_urlencoded, Url};
use uuid::Uuid;

/// Header carrying the request ID in both directions.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Name of the query parameter holding the target URL.
pub const URL_PARAM: &str = "url";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Read the request ID set by the request-id layer.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

/// Why a `url` parameter was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlProblem {
    #[error("not a valid URL: {0}")]
    Unparseable(url::ParseError),

    #[error("unsupported scheme `{0}`, only http and https can be proxied")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("URL cannot be a base (no hierarchical path)")]
    CannotBeABase,

    #[error("URL must not embed credentials")]
    Credentials,
}

/// First `url` value in a raw query string, percent-decoded.
pub fn target_param(query: Option<&str>) -> Option<String> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(name, _)| name == URL_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Parse and check a target URL.
pub fn parse_target(raw: &str) -> Result<Url, Vec<UrlProblem>> {
    let url = Url::parse(raw).map_err(|e| vec![UrlProblem::Unparseable(e)])?;

    let mut problems = Vec::new();
    if !matches!(url.scheme(), "http" | "https") {
        problems.push(UrlProblem::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.cannot_be_a_base() {
        problems.push(UrlProblem::CannotBeABase);
    }
    if !url.has_host() {
        problems.push(UrlProblem::MissingHost);
    }
    if !url.username().is_empty() || url.password().is_some() {
        problems.push(UrlProblem::Credentials);
    }

    if problems.is_empty() {
        Ok(url)
    } else {
        Err(problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_and_decodes_url_param() {
        let query = "x=1&url=http%3A%2F%2Fexample.test%2Fa%3Fb%3Dc&url=ignored";
        assert_eq!(
            target_param(Some(query)).as_deref(),
            Some("http://example.test/a?b=c")
        );
        assert_eq!(target_param(Some("x=1")), None);
        assert_eq!(target_param(None), None);
    }

    #[test]
    fn accepts_http_and_https() {
        assert!(parse_target("http://example.test/a").is_ok());
        assert!(parse_target("https://example.test:8443/a?b=c").is_ok());
    }

    #[test]
    fn rejects_text_that_is_not_a_url() {
        let problems = parse_target("not a url").unwrap_err();
        assert_eq!(
            problems,
            vec![UrlProblem::Unparseable(url::ParseError::RelativeUrlWithoutBase)]
        );
    }

    #[test]
    fn reports_every_structural_problem() {
        let problems = parse_target("mailto:someone@example.test").unwrap_err();
        assert!(problems.contains(&UrlProblem::UnsupportedScheme("mailto".into())));
        assert!(problems.contains(&UrlProblem::CannotBeABase));
        assert!(problems.contains(&UrlProblem::MissingHost));
    }

    #[test]
    fn rejects_credentials() {
        let problems = parse_target("http://user:pw@example.test/").unwrap_err();
        assert_eq!(problems, vec![UrlProblem::Credentials]);
    }

    #[test]
    fn request_ids_are_uuids() {
        let request = Request::new(());
        let id = UuidRequestId.make_request_id(&request).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
    }
}
