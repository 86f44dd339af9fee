//! Load plans, resource specs and caching hints

use crate::error::LoadError;
use crate::request::{Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Per-resource caching strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    /// Serve cached data immediately, refresh in the background when stale
    #[default]
    StaleWhileRevalidate,
    /// Serve a fresh cached value, otherwise fetch and populate
    CacheFirst,
    /// Always fetch, fall back to the cache when the fetch fails
    NetworkFirst,
    /// Always fetch, never touch the cache
    NoStore,
}

impl CacheStrategy {
    /// Whether this strategy reads or writes cache entries at all
    pub fn uses_cache(self) -> bool {
        !matches!(self, CacheStrategy::NoStore)
    }
}

/// Caching hints attached to a resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheHints {
    /// Falls back to the cache's default strategy
    pub strategy: Option<CacheStrategy>,
    /// Freshness window; falls back to the cache's default ttl
    pub ttl: Option<Duration>,
    /// Age after which stale-while-revalidate refreshes in the background
    /// (defaults to `ttl`)
    pub soft_ttl: Option<Duration>,
    pub tags: BTreeSet<String>,
    /// Cached entries written under another version are treated as misses
    pub version: Option<String>,
}

/// Custom body parser
pub type CustomParser = Arc<dyn Fn(&Response) -> Result<Value, LoadError> + Send + Sync>;

/// How a response body turns into data
#[derive(Clone, Default)]
pub enum ResponseParser {
    #[default]
    Json,
    Text,
    /// `{"type": <content-type>, "size": <len>, "bytes": [..]}`
    Blob,
    /// Body bytes as a JSON array of numbers
    Bytes,
    Custom(CustomParser),
}

impl fmt::Debug for ResponseParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseParser::Json => f.write_str("Json"),
            ResponseParser::Text => f.write_str("Text"),
            ResponseParser::Blob => f.write_str("Blob"),
            ResponseParser::Bytes => f.write_str("Bytes"),
            ResponseParser::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl ResponseParser {
    /// Parse `response`; `url` is only used for error messages
    pub fn parse(&self, url: &str, response: &Response) -> Result<Value, LoadError> {
        let parse_error = |message: String| LoadError::Parse {
            url: url.to_string(),
            message,
        };

        match self {
            ResponseParser::Json => {
                serde_json::from_slice(&response.body).map_err(|e| parse_error(e.to_string()))
            }
            ResponseParser::Text => String::from_utf8(response.body.clone())
                .map(Value::String)
                .map_err(|e| parse_error(e.to_string())),
            ResponseParser::Blob => Ok(json!({
                "type": response.header("content-type").unwrap_or(""),
                "size": response.body.len(),
                "bytes": response.body,
            })),
            ResponseParser::Bytes => Ok(json!(response.body)),
            ResponseParser::Custom(parse) => parse(response),
        }
    }
}

/// A single resource: request, parser and caching hints
#[derive(Debug, Clone)]
pub struct ResourceSpec {
    pub request: Request,
    pub parser: ResponseParser,
    pub cache: CacheHints,
}

impl ResourceSpec {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            parser: ResponseParser::default(),
            cache: CacheHints::default(),
        }
    }

    /// GET `url`, parsed as JSON
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Request::get(url))
    }

    pub fn parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn text(self) -> Self {
        self.parser(ResponseParser::Text)
    }

    pub fn custom<F>(self, parse: F) -> Self
    where
        F: Fn(&Response) -> Result<Value, LoadError> + Send + Sync + 'static,
    {
        self.parser(ResponseParser::Custom(Arc::new(parse)))
    }

    pub fn strategy(mut self, strategy: CacheStrategy) -> Self {
        self.cache.strategy = Some(strategy);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = Some(ttl);
        self
    }

    pub fn soft_ttl(mut self, soft_ttl: Duration) -> Self {
        self.cache.soft_ttl = Some(soft_ttl);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.cache.tags.insert(tag.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.cache.version = Some(version.into());
        self
    }
}

/// Mapping from logical names to resources, resolved together
///
/// Declaration order is kept; the resolved data is a JSON object keyed by name.
#[derive(Debug, Clone, Default)]
pub struct LoadPlan {
    resources: Vec<(String, ResourceSpec)>,
}

impl LoadPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a named resource
    pub fn with(mut self, name: impl Into<String>, spec: ResourceSpec) -> Self {
        self.insert(name, spec);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: ResourceSpec) {
        let name = name.into();
        match self.resources.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = spec,
            None => self.resources.push((name, spec)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceSpec)> {
        self.resources.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
