//! Route patterns: string templates and regular expressions
//!
//! Template parsing and matching are **pure**: same input → same output, no side effects.

use regex::Regex;
use std::borrow::Cow;

/// Parameter key a wildcard segment captures under
pub const WILDCARD_KEY: &str = "*";

/// Represents different types of template segments
///
/// # Examples
///
/// ```
/// use rhtmx_router::route::pattern::{classify_segment, PatternSegmentType};
///
/// assert!(matches!(classify_segment("about"), PatternSegmentType::Static(_)));
/// assert!(matches!(classify_segment(":id"), PatternSegmentType::Required(_)));
/// assert!(matches!(classify_segment(":id?"), PatternSegmentType::Optional(_)));
/// assert_eq!(classify_segment("*"), PatternSegmentType::Wildcard);
/// assert_eq!(classify_segment("*?"), PatternSegmentType::OptionalWildcard);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegmentType {
    /// Wildcard `*`: the rest of the path, at least one segment
    Wildcard,
    /// Optional wildcard `*?`: the rest of the path, possibly empty
    OptionalWildcard,
    /// Optional parameter: `:id?`
    Optional(String),
    /// Required parameter: `:id`
    Required(String),
    /// Static text segment
    Static(String),
}

/// Classifies a template segment (pure function)
///
/// # Parsing Rules (evaluated in order)
///
/// 1. **Wildcard**: `*` or `*?`
/// 2. **Optional param**: `:name?`
/// 3. **Required param**: `:name`
/// 4. **Static**: Any other text
pub fn classify_segment(segment: &str) -> PatternSegmentType {
    match segment {
        "*" => PatternSegmentType::Wildcard,
        "*?" => PatternSegmentType::OptionalWildcard,
        _ => match segment.strip_prefix(':') {
            Some(name) => match name.strip_suffix('?') {
                Some(name) => PatternSegmentType::Optional(name.to_string()),
                None => PatternSegmentType::Required(name.to_string()),
            },
            None => PatternSegmentType::Static(segment.to_string()),
        },
    }
}

/// Raw captures of a pattern match, in pattern order
pub type Captures = Vec<(String, Option<String>)>;

/// A compiled route pattern
#[derive(Debug, Clone)]
pub enum RoutePattern {
    /// String template like `/users/:id` or `/docs/*`
    Template {
        source: String,
        segments: Vec<PatternSegmentType>,
    },
    /// Regular expression; named groups become parameters
    Regex(Regex),
}

impl RoutePattern {
    /// Parse a string template
    ///
    /// ```
    /// use rhtmx_router::route::pattern::RoutePattern;
    ///
    /// let pattern = RoutePattern::template("/users/:id/:tab?");
    /// assert_eq!(pattern.param_names(), vec!["id", "tab"]);
    /// ```
    pub fn template(source: &str) -> Self {
        let segments = source
            .split('/')
            .filter(|s| !s.is_empty())
            .map(classify_segment)
            .collect();

        RoutePattern::Template {
            source: source.to_string(),
            segments,
        }
    }

    pub fn regex(regex: Regex) -> Self {
        RoutePattern::Regex(regex)
    }

    /// Pattern text as declared
    pub fn source(&self) -> &str {
        match self {
            RoutePattern::Template { source, .. } => source,
            RoutePattern::Regex(regex) => regex.as_str(),
        }
    }

    /// Ordered parameter names, or the named capture groups of a regex
    pub fn param_names(&self) -> Vec<String> {
        match self {
            RoutePattern::Template { segments, .. } => segments
                .iter()
                .filter_map(|segment| match segment {
                    PatternSegmentType::Required(name) | PatternSegmentType::Optional(name) => {
                        Some(name.clone())
                    }
                    PatternSegmentType::Wildcard | PatternSegmentType::OptionalWildcard => {
                        Some(WILDCARD_KEY.to_string())
                    }
                    PatternSegmentType::Static(_) => None,
                })
                .collect(),
            RoutePattern::Regex(regex) => regex.capture_names().flatten().map(String::from).collect(),
        }
    }

    /// Match a base-relative path (without query or fragment)
    ///
    /// Template matching ignores a trailing slash and percent-decodes the
    /// captured values; `case_insensitive` only applies to static segments of
    /// templates. Unnamed regex groups contribute nothing.
    ///
    /// ```
    /// use rhtmx_router::route::pattern::RoutePattern;
    ///
    /// let pattern = RoutePattern::template("foo/bar/*");
    /// let captures = pattern.captures("/foo/bar/baz/bat", true).unwrap();
    /// assert_eq!(captures, vec![("*".to_string(), Some("baz/bat".to_string()))]);
    /// ```
    pub fn captures(&self, path: &str, case_insensitive: bool) -> Option<Captures> {
        match self {
            RoutePattern::Template { segments, .. } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                match_segments(segments, &path_segments, 0, 0, Vec::new(), case_insensitive)
            }
            RoutePattern::Regex(regex) => {
                let caps = regex.captures(path)?;
                Some(
                    regex
                        .capture_names()
                        .flatten()
                        .map(|name| (name.to_string(), caps.name(name).map(|m| m.as_str().to_string())))
                        .collect(),
                )
            }
        }
    }
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| segment.to_string())
}

fn static_eq(pattern: &str, segment: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        pattern.eq_ignore_ascii_case(segment)
    } else {
        pattern == segment
    }
}

/// Recursive template matcher with backtracking
///
/// Optional parameters first try to consume a path segment and fall back to
/// `None`; wildcards take the longest tail that still lets the segments after
/// them match.
fn match_segments(
    pattern: &[PatternSegmentType],
    path: &[&str],
    pattern_idx: usize,
    path_idx: usize,
    mut captures: Captures,
    case_insensitive: bool,
) -> Option<Captures> {
    let Some(segment) = pattern.get(pattern_idx) else {
        return (path_idx == path.len()).then_some(captures);
    };

    match segment {
        PatternSegmentType::Wildcard | PatternSegmentType::OptionalWildcard => {
            let min = usize::from(*segment == PatternSegmentType::Wildcard);
            let available = path.len().saturating_sub(path_idx);

            (min..=available).rev().find_map(|taken| {
                let mut attempt = captures.clone();
                let value = (taken > 0).then(|| decode(&path[path_idx..path_idx + taken].join("/")));
                attempt.push((WILDCARD_KEY.to_string(), value));
                match_segments(pattern, path, pattern_idx + 1, path_idx + taken, attempt, case_insensitive)
            })
        }
        PatternSegmentType::Optional(name) => {
            if let Some(current) = path.get(path_idx) {
                let mut attempt = captures.clone();
                attempt.push((name.clone(), Some(decode(current))));
                let consumed = match_segments(pattern, path, pattern_idx + 1, path_idx + 1, attempt, case_insensitive);
                if consumed.is_some() {
                    return consumed;
                }
            }
            captures.push((name.clone(), None));
            match_segments(pattern, path, pattern_idx + 1, path_idx, captures, case_insensitive)
        }
        PatternSegmentType::Required(name) => {
            let current = path.get(path_idx)?;
            captures.push((name.clone(), Some(decode(current))));
            match_segments(pattern, path, pattern_idx + 1, path_idx + 1, captures, case_insensitive)
        }
        PatternSegmentType::Static(expected) => {
            let current = path.get(path_idx)?;
            if !static_eq(expected, current, case_insensitive) {
                return None;
            }
            match_segments(pattern, path, pattern_idx + 1, path_idx + 1, captures, case_insensitive)
        }
    }
}
