//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Root configuration for the forwarding proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, port, public URL).
    pub listener: ListenerConfig,

    /// Inbound server tuning.
    pub server: ServerConfig,

    /// Upstream fetch settings.
    pub fetch: FetchConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Apply command-line overrides on top of file-based values.
    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(port) = overrides.port {
            self.listener.port = port;
        }
        if let Some(bind) = &overrides.bind_address {
            self.listener.bind_address = bind.clone();
        }
        if let Some(public_url) = &overrides.public_url {
            self.listener.public_url = Some(public_url.clone());
        }
        if let Some(threads) = overrides.worker_threads {
            self.server.worker_threads = threads;
        }
        if let Some(threads) = overrides.download_threads {
            self.fetch.threads = threads;
        }
        if let Some(max) = overrides.max_content_length {
            self.server.max_content_length = max;
        }
        if let Some(level) = &overrides.log_level {
            self.observability.log_level = level.clone();
        }
    }
}

/// Values supplied on the command line, applied after every config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub public_url: Option<String>,
    pub worker_threads: Option<usize>,
    pub download_threads: Option<usize>,
    pub max_content_length: Option<usize>,
    pub log_level: Option<String>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// IP address to bind (e.g., "0.0.0.0").
    pub bind_address: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Base URL clients use to reach this proxy.
    ///
    /// Rewritten `Location` headers point here. When unset, the inbound
    /// `Host` header is used instead.
    pub public_url: Option<String>,
}

impl ListenerConfig {
    /// `bind_address:port`, ready for `TcpListener::bind`. IPv6 addresses
    /// are bracketed.
    pub fn socket_address(&self) -> String {
        match self.bind_address.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, self.port).to_string(),
            Err(_) => format!("{}:{}", self.bind_address, self.port),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5957,
            public_url: None,
        }
    }
}

/// Inbound server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Worker threads for the inbound runtime.
    pub worker_threads: usize,

    /// Maximum inbound request body in bytes. Only GET is served, so this
    /// stays small.
    pub max_content_length: usize,

    /// Total time allowed for one inbound request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 12,
            max_content_length: 128,
            request_timeout_secs: 60,
        }
    }
}

/// Upstream fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Threads in the dedicated fetch pool.
    pub threads: usize,

    /// Deadline for a complete upstream fetch, in seconds.
    pub timeout_secs: u64,

    /// Connection establishment timeout, in seconds.
    pub connect_timeout_secs: u64,

    /// User-Agent sent upstream.
    pub user_agent: String,

    /// Largest upstream body that will be buffered.
    pub max_body_bytes: usize,

    /// Share one upstream fetch between concurrent misses for the same URL.
    pub coalesce_inflight: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            threads: 12,
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("get-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
            max_body_bytes: 64 * 1024 * 1024,
            coalesce_inflight: true,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry-count bound. `None` keeps every response for the life of the
    /// process.
    pub max_entries: Option<usize>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_settings() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.port, 5957);
        assert_eq!(config.server.worker_threads, 12);
        assert_eq!(config.server.max_content_length, 128);
        assert_eq!(config.fetch.threads, 12);
        assert!(config.cache.max_entries.is_none());
        assert_eq!(config.listener.socket_address(), "0.0.0.0:5957");

        let v6 = ListenerConfig { bind_address: "::1".into(), ..Default::default() };
        assert_eq!(v6.socket_address(), "[::1]:5957");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [listener]
            port = 8080

            [fetch]
            threads = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.listener.bind_address, "0.0.0.0");
        assert_eq!(config.fetch.threads, 4);
        assert_eq!(config.fetch.timeout_secs, 30);
    }

    #[test]
    fn overrides_win() {
        let mut config = ProxyConfig::default();
        config.apply_overrides(&CliOverrides {
            port: Some(9000),
            download_threads: Some(2),
            log_level: Some("debug".into()),
            ..Default::default()
        });
        assert_eq!(config.listener.port, 9000);
        assert_eq!(config.fetch.threads, 2);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.server.worker_threads, 12);
    }
}
