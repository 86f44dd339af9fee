//! Navigation engine
//!
//! A [`Navigator`] turns URL changes into committed navigations: it matches
//! the target, runs guards and loaders, writes the history entry and places
//! scroll. Only the newest navigation ever commits.

mod engine;
mod preload;
mod snapshot;

pub use engine::{ClickAction, Navigator, NavigatorBuilder, PopAction};
pub use preload::Preloaded;
pub use snapshot::{RouteSnapshot, SnapshotListener, SubscriptionId};

use crate::host::LinkClick;
use crate::route::{CompiledRoute, LoadState, Params};
use crate::{lock, BoxFuture};
use rhtmx_loader::{LoadError, Revalidation, RevalidateSink};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex};
use url::Url;

/// What started a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationType {
    /// Programmatic `goto`, including the initial navigation
    Goto,
    /// An intercepted link activation
    Link,
    /// History traversal (back/forward)
    PopState,
    /// The document is unloading
    Leave,
}

impl NavigationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NavigationType::Goto => "goto",
            NavigationType::Link => "link",
            NavigationType::PopState => "popstate",
            NavigationType::Leave => "leave",
        }
    }
}

impl fmt::Display for NavigationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform event behind a navigation
#[derive(Debug, Clone, PartialEq)]
pub enum NavEvent {
    Click(LinkClick),
    /// Traversal, with the state of the entry landed on
    PopState(Value),
    BeforeUnload,
}

/// One level of a match chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainLevel {
    Group { layout: Option<String> },
    Route { pattern: String },
}

/// A chain level with the data its loader produced
#[derive(Debug, Clone, PartialEq)]
pub struct ChainNode {
    pub level: ChainLevel,
    pub data: LoadState,
}

/// A resolved destination: the URL, what matched and what was loaded
#[derive(Debug, Clone)]
pub struct NavigationTarget {
    pub url: Url,
    /// Base-relative path
    pub path: String,
    pub params: Params,
    /// `None` when nothing matched
    pub route: Option<Arc<CompiledRoute>>,
    /// Groups outermost first, then the route itself
    pub chain: Vec<ChainNode>,
    /// First loader failure, or a 404 when nothing matched
    pub error: Option<LoadError>,
}

impl NavigationTarget {
    /// Data loaded for the route itself
    pub fn data(&self) -> Option<&Value> {
        self.chain.last().and_then(|node| node.data.value())
    }

    pub fn is_not_found(&self) -> bool {
        self.route.is_none()
    }

    /// Pattern source of the matched route
    pub fn route_source(&self) -> Option<&str> {
        self.route.as_deref().map(CompiledRoute::source)
    }
}

/// A navigation in progress, as seen by guards and hooks
#[derive(Debug, Clone)]
pub struct Navigation {
    pub kind: NavigationType,
    /// The committed location being left (`None` on the first navigation)
    pub from: Option<NavigationTarget>,
    /// The resolved destination; filled in once loading finished
    pub to: Option<NavigationTarget>,
    /// Requested destination URL, known before anything is resolved
    pub destination: Option<Url>,
    /// The document is about to unload
    pub will_unload: bool,
    pub event: Option<NavEvent>,
    cancelled: bool,
}

impl Navigation {
    pub fn new(kind: NavigationType, from: Option<NavigationTarget>, destination: Option<Url>) -> Self {
        Self {
            kind,
            from,
            to: None,
            destination,
            will_unload: false,
            event: None,
            cancelled: false,
        }
    }

    pub fn with_event(mut self, event: Option<NavEvent>) -> Self {
        self.event = event;
        self
    }

    /// Stop the navigation; remaining guards are skipped
    pub fn cancel(&mut self) {
        if !self.cancelled {
            tracing::debug!("{} navigation cancelled", self.kind);
            self.cancelled = true;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Options for [`Navigator::goto`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GotoOptions {
    /// Overwrite the current history entry instead of adding one
    pub replace: bool,
}

impl GotoOptions {
    pub fn replace() -> Self {
        Self { replace: true }
    }
}

/// How a navigation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    Committed,
    /// A guard or hook cancelled it
    Cancelled,
    /// A newer navigation started before this one committed
    Superseded,
    /// The URL could not be resolved within the base
    Invalid,
}

/// Lets the after-navigate hook subscribe to background data refreshes
#[derive(Clone, Default)]
pub struct RevalidationHandle {
    listener: Arc<Mutex<Option<RevalidateSink>>>,
}

impl RevalidationHandle {
    /// Called whenever a background refresh of this navigation's data
    /// produced changed data
    pub fn on_revalidate<F>(&self, f: F)
    where
        F: Fn(Revalidation) + Send + Sync + 'static,
    {
        *lock(&self.listener) = Some(Arc::new(f));
    }

    /// A sink forwarding to whatever listener is registered when it fires
    pub(crate) fn sink(&self) -> RevalidateSink {
        let listener = Arc::clone(&self.listener);
        Arc::new(move |revalidation| {
            let current = lock(&listener).clone();
            match current {
                Some(notify) => notify(revalidation),
                None => tracing::trace!("Revalidation of {} with no listener", revalidation.key.as_str()),
            }
        })
    }
}

impl fmt::Debug for RevalidationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevalidationHandle")
            .field("listening", &lock(&self.listener).is_some())
            .finish()
    }
}

/// Global hook run before every navigation, after the leave guards
pub type BeforeNavigate = Arc<dyn Fn(&mut Navigation) + Send + Sync>;

/// Global hook awaited after a navigation committed, before scroll placement
pub type AfterNavigate = Arc<dyn Fn(&Navigation, &RevalidationHandle) -> BoxFuture<'static, ()> + Send + Sync>;
