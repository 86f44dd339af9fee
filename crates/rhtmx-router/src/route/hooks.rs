//! Per-route hook configuration and the two-bag merge

use crate::navigation::Navigation;
use crate::route::loader::Loader;
use crate::route::params::Params;
use crate::BoxFuture;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Predicate over a raw parameter value (`None` when absent or null)
pub type Validator = Arc<dyn Fn(Option<&str>) -> bool + Send + Sync>;

/// Turns a raw parameter value into a typed value
pub type Coercer = Arc<dyn Fn(Option<&str>) -> Value + Send + Sync>;

/// Route-level gate over the full raw parameter set
pub type ValidateHook = Arc<dyn Fn(Params) -> BoxFuture<'static, bool> + Send + Sync>;

/// Leave guard; may call [`Navigation::cancel`]
pub type LeaveGuard = Arc<dyn Fn(&mut Navigation) + Send + Sync>;

/// Validator and/or coercer for one parameter
///
/// The validator runs during matching and can reject the route; the coercer
/// only runs once the route is accepted.
#[derive(Clone, Default)]
pub struct ParamRule {
    pub validator: Option<Validator>,
    pub coercer: Option<Coercer>,
}

impl ParamRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// A rule that rejects every value, so the route is always skipped
    pub fn never() -> Self {
        Self::new().validate(|_| false)
    }

    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    pub fn coerce<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&str>) -> Value + Send + Sync + 'static,
    {
        self.coercer = Some(Arc::new(f));
        self
    }

    /// Overlay `other` on top of this rule; each side overrides independently
    pub fn merge(self, other: ParamRule) -> ParamRule {
        ParamRule {
            validator: other.validator.or(self.validator),
            coercer: other.coercer.or(self.coercer),
        }
    }
}

impl fmt::Debug for ParamRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamRule")
            .field("validator", &self.validator.is_some())
            .field("coercer", &self.coercer.is_some())
            .finish()
    }
}

/// Hooks attached to a leaf route
#[derive(Clone, Default)]
pub struct RouteHooks {
    pub param_rules: BTreeMap<String, ParamRule>,
    pub validate: Option<ValidateHook>,
    pub loader: Option<Loader>,
    pub before_leave: Option<LeaveGuard>,
    /// Free-form data for the rendering layer (component ids, titles, ...)
    pub meta: BTreeMap<String, Value>,
}

impl RouteHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, rule: ParamRule) -> Self {
        self.param_rules.insert(name.into(), rule);
        self
    }

    /// Async route-level gate; returning false skips the route
    pub fn validate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.validate = Some(Arc::new(move |params| -> BoxFuture<'static, bool> { Box::pin(f(params)) }));
        self
    }

    pub fn loader(mut self, loader: Loader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn before_leave<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Navigation) + Send + Sync + 'static,
    {
        self.before_leave = Some(Arc::new(f));
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Overlay `extra` on top of these hooks
    ///
    /// Every field set in `extra` replaces the one here, except `param_rules`
    /// (merged per parameter, see [`ParamRule::merge`]) and `meta` (merged
    /// per key).
    pub fn merge(mut self, extra: RouteHooks) -> RouteHooks {
        for (name, rule) in extra.param_rules {
            let merged = match self.param_rules.remove(&name) {
                Some(base) => base.merge(rule),
                None => rule,
            };
            self.param_rules.insert(name, merged);
        }
        self.meta.extend(extra.meta);

        RouteHooks {
            param_rules: self.param_rules,
            validate: extra.validate.or(self.validate),
            loader: extra.loader.or(self.loader),
            before_leave: extra.before_leave.or(self.before_leave),
            meta: self.meta,
        }
    }
}

impl fmt::Debug for RouteHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHooks")
            .field("param_rules", &self.param_rules)
            .field("validate", &self.validate.is_some())
            .field("loader", &self.loader)
            .field("before_leave", &self.before_leave.is_some())
            .field("meta", &self.meta)
            .finish()
    }
}
