//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared cache, fetch pool and upstream client once
//! - Create the Axum Router with the single proxy endpoint
//! - Wire up middleware (tracing, body limit, timeout, request ID)
//! - Serve on a listener until shutdown is signalled

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::CONNECTION;
use axum::http::{HeaderMap, HeaderValue};
use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::cache::Cache;
use crate::config::ProxyConfig;
use crate::fetch::{FetchPool, Fetcher, HttpFetcher, Upstream};
use crate::http::proxy::{base_from_host, proxy_handler};
use crate::http::request::UuidRequestId;

/// Errors building the server's collaborators.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to start fetch pool: {0}")]
    FetchPool(#[from] std::io::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid public url `{0}`")]
    PublicUrl(String),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<Cache>,
    pub upstream: Arc<Upstream>,
    /// Configured public base URL, if any.
    pub public_base: Option<Arc<Url>>,
    /// Used when neither a public URL nor a `Host` header is available.
    pub fallback_base: Arc<Url>,
}

impl AppState {
    /// Base URL that rewritten `Location` headers point at.
    pub fn proxy_base(&self, headers: &HeaderMap) -> Url {
        if let Some(base) = &self.public_base {
            return Url::clone(base);
        }
        base_from_host(headers).unwrap_or_else(|| Url::clone(&self.fallback_base))
    }
}

/// HTTP server for the forwarding proxy.
pub struct HttpServer {
    router: Router,
    cache: Arc<Cache>,
}

impl HttpServer {
    /// Create a server that fetches with the reqwest-backed client.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Create a server around any `Fetcher`.
    pub fn with_fetcher(config: ProxyConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, ServerError> {
        let cache = Arc::new(Cache::from_config(&config.cache));
        let pool = FetchPool::new(config.fetch.threads)?;
        let upstream = Arc::new(Upstream::new(
            fetcher,
            pool,
            Arc::clone(&cache),
            Duration::from_secs(config.fetch.timeout_secs),
            config.fetch.coalesce_inflight,
        ));

        let public_base = match &config.listener.public_url {
            Some(raw) => Some(Arc::new(
                Url::parse(raw).map_err(|_| ServerError::PublicUrl(raw.clone()))?,
            )),
            None => None,
        };
        let fallback = format!("http://{}/", config.listener.socket_address());
        let fallback_base = Arc::new(
            Url::parse(&fallback).map_err(|_| ServerError::PublicUrl(fallback.clone()))?,
        );

        tracing::info!(
            cache_policy = cache.policy_name(),
            fetch_threads = config.fetch.threads,
            coalesce_inflight = config.fetch.coalesce_inflight,
            "Proxy initialised"
        );

        let state = AppState {
            cache: Arc::clone(&cache),
            upstream,
            public_base,
            fallback_base,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, cache })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// axum hands HEAD to GET endpoints; `proxy_handler` refuses it itself.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(proxy_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.server.max_content_length))
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
            // Covers responses produced by the layers above, such as 408 and 413.
            .layer(SetResponseHeaderLayer::overriding(
                CONNECTION,
                HeaderValue::from_static("close"),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!(cached_entries = self.cache.len(), "HTTP server stopped");
        Ok(())
    }

    /// The router, for driving the proxy without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The shared response cache.
    pub fn cache(&self) -> Arc<Cache> {
        Arc::clone(&self.cache)
    }
}
