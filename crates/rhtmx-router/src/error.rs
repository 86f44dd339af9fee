//! Route table configuration errors

use thiserror::Error;

/// Errors raised while compiling a route table
///
/// Routing misses, guard rejections and cancelled navigations are expected
/// control flow and never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route #{index} has an empty pattern")]
    EmptyPattern { index: usize },

    #[error("route #{index} has an invalid regular expression `{pattern}`: {message}")]
    InvalidRegex {
        index: usize,
        pattern: String,
        message: String,
    },

    #[error("route group{} has no children", .layout.as_deref().map(|l| format!(" `{}`", l)).unwrap_or_default())]
    EmptyGroup { layout: Option<String> },

    #[error("invalid base path `{0}`: must not contain a query or fragment")]
    InvalidBase(String),
}
