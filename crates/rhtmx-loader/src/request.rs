//! Requests, responses and canonical request identity

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

/// Canonical request identity: upper-cased method plus normalized absolute URL
///
/// Independent of the caching strategy used to load the resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// An outgoing request handed to the [`Fetch`](crate::Fetch) transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    /// Absolute, or relative to the cache's configured base URL
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// GET request for `url`
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Resolve this request against `base` and compute its cache key
    ///
    /// The fragment is dropped and query pairs are sorted, so
    /// `/a?y=2&x=1#top` and `/a?x=1&y=2` share one identity.
    pub fn canonical_key(&self, base: Option<&Url>) -> Result<CacheKey, LoadError> {
        let mut url = self.resolve(base)?;
        url.set_fragment(None);

        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            pairs.sort();
            url.query_pairs_mut().clear().extend_pairs(pairs.iter());
        }

        Ok(CacheKey(format!(
            "{} {}",
            self.method.to_ascii_uppercase(),
            url
        )))
    }

    /// Resolve the request URL to an absolute URL
    pub fn resolve(&self, base: Option<&Url>) -> Result<Url, LoadError> {
        let parsed = match base {
            Some(base) => base.join(&self.url),
            None => Url::parse(&self.url),
        };
        parsed.map_err(|e| LoadError::InvalidUrl {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }
}

/// A response returned by the transport
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub status: u16,
    /// Header names are stored lower-cased
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// 200 response carrying `value` as a JSON body
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(200, value.to_string()).with_header("content-type", "application/json")
    }

    /// 200 response carrying a plain text body
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(200, body.into()).with_header("content-type", "text/plain")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Change-detection token: the entity tag, else the last-modified stamp
    pub fn change_token(&self) -> Option<String> {
        self.header("etag")
            .or_else(|| self.header("last-modified"))
            .map(str::to_string)
    }
}
