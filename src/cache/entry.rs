//! Cached response records.

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;

/// Ordered header multimap that keeps names exactly as received.
///
/// `http::HeaderMap` lowercases names and groups repeated names together;
/// this list keeps one slot per occurrence in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, HeaderValue)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one occurrence of `name`.
    pub fn push(&mut self, name: impl Into<String>, value: HeaderValue) {
        self.entries.push((name.into(), value));
    }

    /// First value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a HeaderValue> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&HeaderMap> for HeaderList {
    fn from(map: &HeaderMap) -> Self {
        map.iter()
            .map(|(name, value)| (name.as_str().to_string(), value.clone()))
            .collect()
    }
}

impl FromIterator<(String, HeaderValue)> for HeaderList {
    fn from_iter<I: IntoIterator<Item = (String, HeaderValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A fully formed upstream response as held by the cache.
///
/// `body` is an immutable `Bytes` buffer: clones are independent views of
/// the same frozen bytes, so readers can never observe a partial write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub status: StatusCode,
    /// Reason phrase, when upstream sent a non-canonical one.
    pub reason: Option<String>,
    pub headers: HeaderList,
    pub body: Bytes,
}

impl CacheEntry {
    pub fn new(status: StatusCode, headers: HeaderList, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            reason: None,
            headers,
            body: body.into(),
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_names_and_order_per_occurrence() {
        let mut headers = HeaderList::new();
        headers.push("Set-Cookie", HeaderValue::from_static("a=1"));
        headers.push("X-Test", HeaderValue::from_static("1"));
        headers.push("set-cookie", HeaderValue::from_static("b=2"));

        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["Set-Cookie", "X-Test", "set-cookie"]);

        let cookies: Vec<_> = headers.get_all("SET-COOKIE").collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        assert_eq!(headers.get("x-test").unwrap(), "1");
    }

    #[test]
    fn from_header_map_keeps_repeated_values() {
        let mut map = HeaderMap::new();
        map.append("vary", HeaderValue::from_static("accept"));
        map.append("vary", HeaderValue::from_static("origin"));
        map.insert("etag", HeaderValue::from_static("\"v1\""));

        let list = HeaderList::from(&map);
        assert_eq!(list.len(), 3);
        assert_eq!(list.get_all("Vary").count(), 2);
    }
}
