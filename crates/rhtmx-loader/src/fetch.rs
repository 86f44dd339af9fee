//! Transport contract

use crate::error::LoadError;
use crate::request::{Request, Response};
use async_trait::async_trait;
use std::future::Future;

/// Request-in/response-out transport
///
/// The loader treats it as a black box: it only looks at the status, the
/// headers (for change detection) and the body (for parsing).
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Perform the request
    async fn fetch(&self, request: Request) -> Result<Response, LoadError>;

    /// Transport name, for logging
    fn name(&self) -> &'static str {
        "fetch"
    }
}

/// [`Fetch`] implementation backed by an async closure
pub struct FnFetch<F> {
    f: F,
}

/// Wrap an async closure as a [`Fetch`] transport
///
/// ```
/// use rhtmx_loader::{fetch_fn, Response};
///
/// let fetcher = fetch_fn(|request| async move {
///     Ok(Response::text(format!("hello from {}", request.url)))
/// });
/// ```
pub fn fetch_fn<F, Fut>(f: F) -> FnFetch<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, LoadError>> + Send,
{
    FnFetch { f }
}

#[async_trait]
impl<F, Fut> Fetch for FnFetch<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, LoadError>> + Send,
{
    async fn fetch(&self, request: Request) -> Result<Response, LoadError> {
        (self.f)(request).await
    }

    fn name(&self) -> &'static str {
        "fn"
    }
}
