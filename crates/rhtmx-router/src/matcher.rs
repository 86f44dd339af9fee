//! Matcher: first declared route whose pattern and gates pass

use crate::path::split_suffix;
use crate::route::{CompiledRoute, Params, RouteHooks, RouteTable};
use std::sync::Arc;

/// Result of matching a path against the route table
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route
    pub route: Arc<CompiledRoute>,
    /// Extracted (and coerced) parameters
    pub params: Params,
}

impl RouteTable {
    /// Match a base-relative path
    ///
    /// Candidates are tried in declaration order. For each pattern hit the
    /// per-parameter validators run first, then the route's `validate` hook;
    /// either rejecting moves on to the next candidate. Coercers only run on
    /// the accepted candidate. A query or fragment on `path` is ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_router::{validators, ParamRule, RouteEntry, RouteHooks, RouteTable};
    /// use serde_json::json;
    ///
    /// # tokio_test_block(async {
    /// let table = RouteTable::compile(
    ///     vec![RouteEntry::leaf(
    ///         "/users/:id",
    ///         RouteHooks::new().param(
    ///             "id",
    ///             ParamRule::new().validate(validators::int(Some(1), None)).coerce(validators::number()),
    ///         ),
    ///     )],
    ///     true,
    /// )
    /// .unwrap();
    ///
    /// let hit = table.match_path("/users/3").await.unwrap();
    /// assert_eq!(hit.params.get("id"), Some(&json!(3)));
    /// assert!(table.match_path("/users/0").await.is_none());
    /// # });
    /// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
    /// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
    /// # }
    /// ```
    pub async fn match_path(&self, path: &str) -> Option<RouteMatch> {
        let (path, _) = split_suffix(path);
        tracing::trace!("Matching path: {}", path);

        for route in self.routes() {
            let Some(captures) = route.pattern.captures(path, self.case_insensitive()) else {
                continue;
            };
            let raw = Params::from_raw(captures);

            if !passes_param_rules(&route.hooks, &raw) {
                tracing::debug!("Skipping {}: parameter validator rejected {}", route.source(), path);
                continue;
            }

            if let Some(validate) = &route.hooks.validate {
                if !validate(raw.clone()).await {
                    tracing::debug!("Skipping {}: validate hook rejected {}", route.source(), path);
                    continue;
                }
            }

            let params = coerce_params(&route.hooks, raw);
            tracing::debug!("Matched {} -> {}", path, route.source());
            return Some(RouteMatch {
                route: Arc::clone(route),
                params,
            });
        }

        tracing::debug!("No route matches {}", path);
        None
    }
}

fn passes_param_rules(hooks: &RouteHooks, params: &Params) -> bool {
    hooks.param_rules.iter().all(|(name, rule)| {
        rule.validator
            .as_ref()
            .map_or(true, |validate| validate(params.get_str(name)))
    })
}

fn coerce_params(hooks: &RouteHooks, mut params: Params) -> Params {
    for (name, rule) in &hooks.param_rules {
        if let (Some(coerce), true) = (&rule.coercer, params.contains(name)) {
            let value = coerce(params.get_str(name));
            params.insert(name.clone(), value);
        }
    }
    params
}
