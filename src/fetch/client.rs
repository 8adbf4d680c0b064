//! reqwest-backed upstream fetcher.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};
use url::Url;

use crate::cache::{CacheEntry, HeaderList};
use crate::config::FetchConfig;

use super::{ErrorResponse, FetchError, FetchOutcome, Fetcher};

/// Fetches over HTTP(S) without following redirects.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            // Targets are fetched directly, never through an environment proxy.
            .no_proxy()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> FetchOutcome {
        let mut response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Upstream request failed");
                return FetchOutcome::from(FetchError::Transport(e.to_string()));
            }
        };

        let status = response.status();
        let headers = HeaderList::from(response.headers());
        let reason = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .and_then(|r| std::str::from_utf8(r.as_bytes()).ok())
            .map(str::to_owned);

        match read_body(&mut response, self.max_body_bytes).await {
            Ok(body) => classify(status, reason, headers, body),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to read upstream body");
                FetchOutcome::from(e)
            }
        }
    }
}

/// Buffer the whole body, refusing anything larger than `limit`.
async fn read_body(response: &mut reqwest::Response, limit: usize) -> Result<Bytes, FetchError> {
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(FetchError::BodyTooLarge { limit });
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?
    {
        if body.len() + chunk.len() > limit {
            return Err(FetchError::BodyTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// Split a complete upstream response into the cacheable and error variants.
///
/// Statuses of 400 and above are error responses: relayed, never cached.
/// Everything below, redirects included, is a successful fetch.
pub fn classify(
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderList,
    body: Bytes,
) -> FetchOutcome {
    if status.is_client_error() || status.is_server_error() {
        FetchOutcome::Error(ErrorResponse {
            status,
            headers,
            message: String::from_utf8_lossy(&body).into_owned(),
        })
    } else {
        FetchOutcome::Success(CacheEntry::new(status, headers, body).with_reason(reason))
    }
}
