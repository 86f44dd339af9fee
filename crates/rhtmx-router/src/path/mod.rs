//! Route paths and the base they are mounted under
//!
//! A route path is canonical when it starts with `/`, has no empty segments
//! or backslashes and carries no trailing slash (the root `/` excepted).

use crate::error::RouteError;
use std::borrow::Cow;

fn is_canonical(path: &str) -> bool {
    path.starts_with('/')
        && !path.contains("//")
        && !path.contains('\\')
        && (path.len() == 1 || !path.ends_with('/'))
}

/// Bring a path into canonical form, borrowing when it already is
///
/// ```
/// use rhtmx_router::path::normalize_path;
///
/// assert_eq!(normalize_path("users//7/"), "/users/7");
/// assert_eq!(normalize_path("\\docs\\intro"), "/docs/intro");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if is_canonical(path) {
        return Cow::Borrowed(path);
    }

    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split(['/', '\\']).filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    Cow::Owned(out)
}

/// Split a URI into its path and its `?query#fragment` suffix
///
/// ```
/// use rhtmx_router::path::split_suffix;
///
/// assert_eq!(split_suffix("/a/b?x=1#top"), ("/a/b", "?x=1#top"));
/// assert_eq!(split_suffix("/a/b"), ("/a/b", ""));
/// ```
pub fn split_suffix(uri: &str) -> (&str, &str) {
    match uri.find(&['?', '#'][..]) {
        Some(at) => uri.split_at(at),
        None => (uri, ""),
    }
}

/// The base path every route lives under
///
/// Paths are compared against the base case-insensitively, and the base must
/// be followed by `/`, a query, a fragment or the end of the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasePath {
    base: String,
}

impl BasePath {
    /// Create a base path, normalizing it (`app/` → `/app`)
    pub fn new(base: &str) -> Result<Self, RouteError> {
        if base.contains(&['?', '#'][..]) {
            return Err(RouteError::InvalidBase(base.to_string()));
        }
        Ok(Self {
            base: normalize_path(base).into_owned(),
        })
    }

    /// The root base `/`
    pub fn root() -> Self {
        Self {
            base: "/".to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }

    pub fn is_root(&self) -> bool {
        self.base == "/"
    }

    /// Whether an absolute path lies within the base
    pub fn contains(&self, path: &str) -> bool {
        self.strip(path).is_some()
    }

    /// Format a URI into a base-relative route path
    ///
    /// Normalizes the path part, strips the base and keeps any query or
    /// fragment. Returns `None` for an empty URI or a path outside the base.
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_router::path::BasePath;
    ///
    /// let base = BasePath::new("/app").unwrap();
    /// assert_eq!(base.format("/app/users/1/").as_deref(), Some("/users/1"));
    /// assert_eq!(base.format("/APP").as_deref(), Some("/"));
    /// assert_eq!(base.format("/app/search?q=x").as_deref(), Some("/search?q=x"));
    /// assert_eq!(base.format("/application"), None);
    /// assert_eq!(base.format(""), None);
    /// ```
    pub fn format(&self, uri: &str) -> Option<String> {
        if uri.is_empty() {
            return None;
        }

        let (path, suffix) = split_suffix(uri);
        let normalized = normalize_path(path);
        let rest = self.strip(&normalized)?;
        let rest = if rest.is_empty() { "/" } else { rest };

        Some(format!("{}{}", rest, suffix))
    }

    /// Prefix a base-relative absolute path with the base
    ///
    /// ```
    /// use rhtmx_router::path::BasePath;
    ///
    /// let base = BasePath::new("/app").unwrap();
    /// assert_eq!(base.join("/users"), "/app/users");
    /// assert_eq!(base.join("/"), "/app");
    /// ```
    pub fn join(&self, path: &str) -> String {
        match (self.is_root(), path) {
            (true, _) => path.to_string(),
            (false, "/") => self.base.clone(),
            (false, _) => format!("{}{}", self.base, path),
        }
    }

    fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.is_root() {
            return Some(path);
        }

        let head = path.get(..self.base.len())?;
        if !head.eq_ignore_ascii_case(&self.base) {
            return None;
        }

        let rest = &path[self.base.len()..];
        match rest.chars().next() {
            None | Some('/') | Some('?') | Some('#') => Some(rest),
            Some(_) => None,
        }
    }
}

impl Default for BasePath {
    fn default() -> Self {
        Self::root()
    }
}
