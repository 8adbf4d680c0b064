//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (threads > 0, timeouts > 0)
//! - Check addresses and the public base URL parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not an IP address")]
    BindAddress(String),

    #[error("listener.public_url `{0}` is not an absolute http(s) URL")]
    PublicUrl(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if let Some(public_url) = &config.listener.public_url {
        let valid = Url::parse(public_url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::PublicUrl(public_url.clone()));
        }
    }

    let positive: [(&'static str, bool); 7] = [
        ("server.worker_threads", config.server.worker_threads > 0),
        ("server.request_timeout_secs", config.server.request_timeout_secs > 0),
        ("fetch.threads", config.fetch.threads > 0),
        ("fetch.timeout_secs", config.fetch.timeout_secs > 0),
        ("fetch.connect_timeout_secs", config.fetch.connect_timeout_secs > 0),
        ("fetch.max_body_bytes", config.fetch.max_body_bytes > 0),
        ("cache.max_entries", config.cache.max_entries != Some(0)),
    ];
    errors.extend(
        positive
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(field, _)| ValidationError::Zero(field)),
    );

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-ip".into();
        config.listener.public_url = Some("/relative".into());
        config.fetch.threads = 0;
        config.cache.max_entries = Some(0);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero("fetch.threads")));
        assert!(errors.contains(&ValidationError::Zero("cache.max_entries")));
        assert!(errors.contains(&ValidationError::BindAddress("not-an-ip".into())));
    }

    #[test]
    fn metrics_address_only_checked_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::MetricsAddress("nope".into())]
        );
    }
}
