//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! /etc, $HOME, ./ get-proxy.toml, --config file
//!     → loader.rs (parse, layer & deserialize)
//!     → command-line overrides
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → read once at construction by the server, fetcher and cache
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_layered, ConfigError};
pub use schema::{
    CacheConfig, CliOverrides, FetchConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    ServerConfig,
};
pub use validation::{validate_config, ValidationError};
