//! # RHTMX Router
//!
//! Client-side navigation engine for single-page applications:
//! - Route table compiled once from leaves and layout groups
//! - Matching with templates (`/users/:id`, `/posts/:slug?`, `/docs/*`) or
//!   regular expressions with named groups
//! - Per-parameter validators and coercers plus async `validate` hooks
//! - Latest-wins navigation: guards, loaders, history writes, scroll
//! - Path-level preloading and a strategy-aware resource cache
//!   ([`rhtmx_loader`])
//! - Scroll positions keyed by history index, restored on back/forward
//!
//! ## Host adapters
//!
//! The engine never talks to a browser. History, viewport, session storage
//! and paint scheduling are traits in [`host`]; [`host::memory::MemoryHost`]
//! implements all of them in memory.
//!
//! ## Example
//!
//! ```
//! use rhtmx_router::host::memory::MemoryHost;
//! use rhtmx_router::{GotoOptions, Host, Navigator, RouteEntry, RouteHooks};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let platform = MemoryHost::new("https://app.test/");
//! let navigator = Navigator::builder(vec![
//!     RouteEntry::leaf("/", RouteHooks::new()),
//!     RouteEntry::leaf("/users/:id", RouteHooks::new()),
//! ])
//! .build(Host::from_shared(platform.clone()))
//! .unwrap();
//!
//! navigator.attach().await;
//! navigator.goto("/users/7", GotoOptions::default()).await;
//!
//! let current = navigator.current().unwrap();
//! assert_eq!(current.route_source(), Some("/users/:id"));
//! assert_eq!(current.params.get_str("id"), Some("7"));
//! assert_eq!(navigator.route_idx(), 1);
//! # });
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

// ============================================================================
// Module Declarations
// ============================================================================

pub mod config;
pub mod error;
pub mod history;
pub mod host;
pub mod matcher;
pub mod navigation;
pub mod path;
pub mod route;
pub mod scroll;
pub mod validators;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::RouterConfig;
pub use error::RouteError;
pub use history::EntryState;
pub use host::{HistoryStack, Host, LinkClick, PaintScheduler, SessionStore, Viewport};
pub use matcher::RouteMatch;
pub use navigation::{
    AfterNavigate, BeforeNavigate, ChainLevel, ChainNode, ClickAction, GotoOptions, NavEvent, Navigation,
    NavigationOutcome, NavigationTarget, NavigationType, Navigator, NavigatorBuilder, PopAction, Preloaded,
    RevalidationHandle, RouteSnapshot, SnapshotListener, SubscriptionId,
};
pub use path::BasePath;
pub use route::{
    loader_fn, CompiledRoute, LoadState, Loader, LoaderFn, ParamRule, Params, RouteEntry, RouteGroup, RouteHooks,
    RoutePattern, RouteTable, WILDCARD_KEY,
};
pub use scroll::{RegionOffsets, ScrollAction, ScrollCoordinator, ScrollOffset};

pub use rhtmx_loader::BoxFuture;

/// Lock a mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
