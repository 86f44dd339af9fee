//! Load error type

use thiserror::Error;

/// Failure while resolving a loader or a resource
///
/// Cloneable so that one failed in-flight fetch can be handed to every
/// caller that was deduplicated onto it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The transport could not complete the request
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a non-success status
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body could not be parsed with the requested parser
    #[error("failed to parse response from {url}: {message}")]
    Parse { url: String, message: String },

    /// The request URL could not be resolved to an absolute URL
    #[error("invalid request url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    /// A user loader reported a failure
    #[error("{0}")]
    Loader(String),
}

impl LoadError {
    /// Convenience constructor for loader-reported failures
    pub fn loader(message: impl Into<String>) -> Self {
        LoadError::Loader(message.into())
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            LoadError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for LoadError {
    fn from(err: anyhow::Error) -> Self {
        LoadError::Loader(format!("{:#}", err))
    }
}
