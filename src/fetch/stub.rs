//! Counting fetcher for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderValue, StatusCode};
use bytes::Bytes;
use url::Url;

use crate::cache::HeaderList;

use super::client::classify;
use super::{FetchOutcome, Fetcher};

pub(crate) struct StubFetcher {
    status: StatusCode,
    headers: HeaderList,
    body: &'static str,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub(crate) fn ok(body: &'static str) -> Self {
        Self::status(StatusCode::OK, body)
    }

    pub(crate) fn status(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            headers: HeaderList::new(),
            body,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_header(mut self, name: &str, value: &'static str) -> Self {
        self.headers.push(name, HeaderValue::from_static(value));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, _url: &Url) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        classify(
            self.status,
            None,
            self.headers.clone(),
            Bytes::from_static(self.body.as_bytes()),
        )
    }
}
