//! Cache keys.

use std::fmt;
use std::sync::Arc;
use url::Url;

/// The parsed target URL a response is cached under.
///
/// Equality and hashing follow `Url`, so two inputs that parse to the same
/// serialization share a key and nothing else is normalised.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Arc<Url>);

impl CacheKey {
    pub fn new(url: Url) -> Self {
        Self(Arc::new(url))
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Url> for CacheKey {
    fn from(url: Url) -> Self {
        Self::new(url)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
