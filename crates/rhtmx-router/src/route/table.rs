//! Route definitions and the compiled route table

use crate::error::RouteError;
use crate::navigation::Navigation;
use crate::route::hooks::{LeaveGuard, RouteHooks};
use crate::route::loader::Loader;
use crate::route::pattern::RoutePattern;
use regex::Regex;
use std::sync::Arc;

/// Pattern text as declared on a leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSource {
    /// String template (`/users/:id`, `/docs/*`)
    Template(String),
    /// Regular expression source
    Regex(String),
}

/// A terminal, matchable route
#[derive(Debug, Clone)]
pub struct LeafRoute {
    pub pattern: PatternSource,
    pub hooks: RouteHooks,
    /// Second hook bag, merged on top of `hooks`
    pub extra: Option<RouteHooks>,
}

/// A non-matchable node sharing a layout, loader and leave guard with its subtree
#[derive(Clone, Default)]
pub struct RouteGroup {
    pub layout: Option<String>,
    pub loader: Option<Loader>,
    pub before_leave: Option<LeaveGuard>,
    pub children: Vec<RouteEntry>,
}

impl RouteGroup {
    pub fn new(children: Vec<RouteEntry>) -> Self {
        Self {
            children,
            ..Self::default()
        }
    }

    pub fn layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
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
}

impl std::fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGroup")
            .field("layout", &self.layout)
            .field("loader", &self.loader)
            .field("before_leave", &self.before_leave.is_some())
            .field("children", &self.children.len())
            .finish()
    }
}

/// A route definition: a leaf or a group of entries
#[derive(Debug, Clone)]
pub enum RouteEntry {
    Leaf(LeafRoute),
    Group(RouteGroup),
}

impl RouteEntry {
    /// Leaf with a string template
    pub fn leaf(pattern: impl Into<String>, hooks: RouteHooks) -> Self {
        RouteEntry::Leaf(LeafRoute {
            pattern: PatternSource::Template(pattern.into()),
            hooks,
            extra: None,
        })
    }

    /// Leaf with two hook bags, `extra` merged on top of `hooks`
    pub fn leaf_with_extra(pattern: impl Into<String>, hooks: RouteHooks, extra: RouteHooks) -> Self {
        RouteEntry::Leaf(LeafRoute {
            pattern: PatternSource::Template(pattern.into()),
            hooks,
            extra: Some(extra),
        })
    }

    /// Leaf with a regular expression; named groups become parameters
    pub fn regex(pattern: impl Into<String>, hooks: RouteHooks) -> Self {
        RouteEntry::Leaf(LeafRoute {
            pattern: PatternSource::Regex(pattern.into()),
            hooks,
            extra: None,
        })
    }

    pub fn group(group: RouteGroup) -> Self {
        RouteEntry::Group(group)
    }
}

/// A group as seen from a compiled route's ancestor chain
#[derive(Clone)]
pub struct GroupNode {
    pub layout: Option<String>,
    pub loader: Option<Loader>,
    pub before_leave: Option<LeaveGuard>,
}

impl std::fmt::Debug for GroupNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupNode")
            .field("layout", &self.layout)
            .field("loader", &self.loader)
            .finish()
    }
}

/// A leaf ready for matching
#[derive(Debug)]
pub struct CompiledRoute {
    /// Position in declaration order
    pub index: usize,
    pub pattern: RoutePattern,
    /// Effective hooks (extra bag already merged)
    pub hooks: RouteHooks,
    /// Enclosing groups, outermost first
    pub groups: Vec<Arc<GroupNode>>,
}

impl CompiledRoute {
    /// Pattern text as declared
    pub fn source(&self) -> &str {
        self.pattern.source()
    }

    /// Layouts of the enclosing groups, outermost first
    pub fn layouts(&self) -> Vec<&str> {
        self.groups.iter().filter_map(|g| g.layout.as_deref()).collect()
    }

    /// Leave guards, innermost (the route's own) first
    pub fn leave_guards(&self) -> Vec<LeaveGuard> {
        self.hooks
            .before_leave
            .iter()
            .chain(self.groups.iter().rev().filter_map(|g| g.before_leave.as_ref()))
            .cloned()
            .collect()
    }
}

/// Flat, ordered list of compiled routes
///
/// Built once and read-only afterwards; first declared is first tried.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Arc<CompiledRoute>>,
    case_insensitive: bool,
}

impl RouteTable {
    /// Flatten and compile route definitions
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_router::{RouteEntry, RouteGroup, RouteHooks, RouteTable};
    ///
    /// let table = RouteTable::compile(
    ///     vec![
    ///         RouteEntry::leaf("/", RouteHooks::new()),
    ///         RouteEntry::group(
    ///             RouteGroup::new(vec![RouteEntry::leaf("/admin/users", RouteHooks::new())])
    ///                 .layout("admin"),
    ///         ),
    ///     ],
    ///     true,
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(table.len(), 2);
    /// assert_eq!(table.routes()[1].layouts(), vec!["admin"]);
    /// ```
    pub fn compile(entries: Vec<RouteEntry>, case_insensitive: bool) -> Result<Self, RouteError> {
        let mut routes = Vec::new();
        flatten(entries, &[], &mut routes)?;

        tracing::debug!("Compiled route table: {} route(s)", routes.len());
        Ok(Self {
            routes,
            case_insensitive,
        })
    }

    pub fn routes(&self) -> &[Arc<CompiledRoute>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }
}

fn flatten(
    entries: Vec<RouteEntry>,
    ancestors: &[Arc<GroupNode>],
    out: &mut Vec<Arc<CompiledRoute>>,
) -> Result<(), RouteError> {
    for entry in entries {
        match entry {
            RouteEntry::Leaf(leaf) => {
                let index = out.len();
                let pattern = compile_pattern(&leaf.pattern, index)?;
                let hooks = match leaf.extra {
                    Some(extra) => leaf.hooks.merge(extra),
                    None => leaf.hooks,
                };
                out.push(Arc::new(CompiledRoute {
                    index,
                    pattern,
                    hooks,
                    groups: ancestors.to_vec(),
                }));
            }
            RouteEntry::Group(group) => {
                if group.children.is_empty() {
                    return Err(RouteError::EmptyGroup {
                        layout: group.layout,
                    });
                }

                let mut chain = ancestors.to_vec();
                chain.push(Arc::new(GroupNode {
                    layout: group.layout,
                    loader: group.loader,
                    before_leave: group.before_leave,
                }));
                flatten(group.children, &chain, out)?;
            }
        }
    }
    Ok(())
}

fn compile_pattern(source: &PatternSource, index: usize) -> Result<RoutePattern, RouteError> {
    match source {
        PatternSource::Template(text) | PatternSource::Regex(text) if text.trim().is_empty() => {
            Err(RouteError::EmptyPattern { index })
        }
        PatternSource::Template(text) => Ok(RoutePattern::template(text)),
        PatternSource::Regex(text) => Regex::new(text)
            .map(RoutePattern::regex)
            .map_err(|e| RouteError::InvalidRegex {
                index,
                pattern: text.clone(),
                message: e.to_string(),
            }),
    }
}
