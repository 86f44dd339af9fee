//! Loader declarations and their resolution into data

use crate::route::params::Params;
use crate::BoxFuture;
use futures::future::join_all;
use rhtmx_loader::{LoadError, LoadPlan, ResourceCache, RevalidateSink};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Loader producing a value directly
pub type LoaderFn = Arc<dyn Fn(Params) -> BoxFuture<'static, Result<Value, LoadError>> + Send + Sync>;

/// Loader describing its data as a [`LoadPlan`]
pub type PlanFn = Arc<dyn Fn(&Params) -> LoadPlan + Send + Sync>;

/// Wrap an async closure as a [`LoaderFn`]
pub fn loader_fn<F, Fut>(f: F) -> LoaderFn
where
    F: Fn(Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, LoadError>> + Send + 'static,
{
    Arc::new(move |params| -> BoxFuture<'static, Result<Value, LoadError>> { Box::pin(f(params)) })
}

/// How a route or group gets its data
#[derive(Clone)]
pub enum Loader {
    /// One async function
    Direct(LoaderFn),
    /// Several functions awaited concurrently; resolves to an array
    FanOut(Vec<LoaderFn>),
    /// Named resources resolved through the resource cache
    Plan(PlanFn),
}

impl Loader {
    pub fn direct<F, Fut>(f: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, LoadError>> + Send + 'static,
    {
        Loader::Direct(loader_fn(f))
    }

    pub fn fan_out(loaders: Vec<LoaderFn>) -> Self {
        Loader::FanOut(loaders)
    }

    pub fn plan<F>(f: F) -> Self
    where
        F: Fn(&Params) -> LoadPlan + Send + Sync + 'static,
    {
        Loader::Plan(Arc::new(f))
    }

    /// Resolve into data; failures become [`LoadState::Failed`]
    ///
    /// `notify` is handed to the resource cache for plan loaders so fresher
    /// data found by background revalidation can be reported.
    pub async fn resolve(
        &self,
        params: &Params,
        cache: Option<&ResourceCache>,
        notify: Option<RevalidateSink>,
    ) -> LoadState {
        let result = match self {
            Loader::Direct(load) => load(params.clone()).await,
            Loader::FanOut(loaders) => {
                let results = join_all(loaders.iter().map(|load| load(params.clone()))).await;
                results
                    .into_iter()
                    .collect::<Result<Vec<Value>, LoadError>>()
                    .map(Value::Array)
            }
            Loader::Plan(plan) => match cache {
                Some(cache) => cache.load_plan(&plan(params), notify).await,
                None => Err(LoadError::loader("load plan declared but no resource cache configured")),
            },
        };

        match result {
            Ok(value) => LoadState::Loaded(value),
            Err(err) => {
                tracing::debug!("Loader failed: {}", err);
                LoadState::Failed(err)
            }
        }
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loader::Direct(_) => f.write_str("Direct(..)"),
            Loader::FanOut(loaders) => write!(f, "FanOut({})", loaders.len()),
            Loader::Plan(_) => f.write_str("Plan(..)"),
        }
    }
}

/// Data attached to one level of a match chain
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadState {
    /// The level declares no loader
    #[default]
    Empty,
    Loaded(Value),
    /// The loader failed; navigation still completes
    Failed(LoadError),
}

impl LoadState {
    pub fn value(&self) -> Option<&Value> {
        match self {
            LoadState::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            LoadState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LoadState::Failed(_))
    }
}
