//! Configuration loading from disk.
//!
//! Files are layered: `/etc/get-proxy.toml`, `$HOME/get-proxy.toml` and
//! `./get-proxy.toml` are read when present, each overriding the previous
//! one key by key. An explicit `--config` file is applied last and must exist.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// File name looked up in each well-known location.
pub const CONFIG_FILE_NAME: &str = "get-proxy.toml";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "IO error reading {}: {}", path.display(), e),
            ConfigError::Parse(path, e) => write!(f, "Parse error in {}: {}", path.display(), e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a single TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let table = read_table(path)?;
    finish(table, path)
}

/// Well-known locations, lowest precedence first.
pub fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![Path::new("/etc").join(CONFIG_FILE_NAME)];
    if let Some(home) = std::env::var_os("HOME") {
        locations.push(PathBuf::from(home).join(CONFIG_FILE_NAME));
    }
    locations.push(PathBuf::from(CONFIG_FILE_NAME));
    locations
}

/// Layer the default locations, then `explicit`, into one validated config.
pub fn load_layered(explicit: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    load_layered_from(&default_locations(), explicit)
}

/// Layer `locations` (skipping missing files) and then `explicit`.
pub fn load_layered_from(
    locations: &[PathBuf],
    explicit: Option<&Path>,
) -> Result<ProxyConfig, ConfigError> {
    let mut merged = toml::Table::new();
    let mut last = PathBuf::from("<defaults>");

    for path in locations.iter().filter(|p| p.is_file()) {
        tracing::debug!(path = %path.display(), "Layering config file");
        merge_tables(&mut merged, read_table(path)?);
        last = path.clone();
    }

    if let Some(path) = explicit {
        merge_tables(&mut merged, read_table(path)?);
        last = path.to_path_buf();
    }

    finish(merged, &last)
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    content
        .parse::<toml::Table>()
        .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

fn finish(table: toml::Table, source: &Path) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::Value::Table(table)
        .try_into()
        .map_err(|e| ConfigError::Parse(source.to_path_buf(), e))?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Merge `overlay` into `base`; nested tables merge, everything else replaces.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
