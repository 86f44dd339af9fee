//! Route definitions: patterns, hooks, loaders and the compiled table
//!
//! The table is built once at construction and is read-only afterwards.

pub mod hooks;
pub mod loader;
pub mod params;
pub mod pattern;
pub mod table;

pub use hooks::{Coercer, LeaveGuard, ParamRule, RouteHooks, ValidateHook, Validator};
pub use loader::{loader_fn, LoadState, Loader, LoaderFn, PlanFn};
pub use params::Params;
pub use pattern::{classify_segment, PatternSegmentType, RoutePattern, WILDCARD_KEY};
pub use table::{CompiledRoute, GroupNode, LeafRoute, PatternSource, RouteEntry, RouteGroup, RouteTable};
