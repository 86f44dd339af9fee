//! The navigator: latest-wins navigation over a host

use super::preload::{Preloaded, Preloads};
use super::snapshot::{Observers, RouteSnapshot, SubscriptionId};
use super::{
    AfterNavigate, BeforeNavigate, ChainLevel, ChainNode, GotoOptions, NavEvent, Navigation, NavigationOutcome,
    NavigationTarget, NavigationType, RevalidationHandle,
};
use crate::config::RouterConfig;
use crate::error::RouteError;
use crate::history::EntryState;
use crate::host::{Host, LinkClick};
use crate::lock;
use crate::matcher::RouteMatch;
use crate::path::{split_suffix, BasePath};
use crate::route::{LoadState, Params, RouteEntry, RouteTable};
use crate::scroll::{self, decode_fragment, Placement, RegionOffsets, ScrollAction, ScrollCoordinator, ScrollOffset, WINDOW};
use crate::BoxFuture;
use futures::future::join_all;
use rhtmx_loader::{LoadError, ResourceCache};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use url::Url;

/// What a link activation turned into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// Not ours; the platform handles it
    Ignore,
    /// Same fragment as the current URL: only scrolled
    ScrollInPlace(String),
    /// Fragment change on the current path; the platform updates the address
    FragmentNavigation,
    /// Handled as a client-side navigation to this href
    Navigate(String),
}

impl ClickAction {
    /// Whether the platform's default handling must be suppressed
    pub fn prevents_default(&self) -> bool {
        matches!(self, ClickAction::ScrollInPlace(_) | ClickAction::Navigate(_))
    }
}

/// How a history traversal was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopAction {
    /// Detached, or a fragment navigation was pending
    Ignored,
    /// Same path or shallow entry: bookkeeping and scroll only
    Shallow,
    /// Ran a full navigation
    Navigated(NavigationOutcome),
}

/// Builds a [`Navigator`]
pub struct NavigatorBuilder {
    routes: Vec<RouteEntry>,
    config: RouterConfig,
    cache: Option<ResourceCache>,
    before_navigate: Option<BeforeNavigate>,
    after_navigate: Option<AfterNavigate>,
    scroll_regions: Vec<String>,
}

impl NavigatorBuilder {
    pub fn new(routes: Vec<RouteEntry>) -> Self {
        Self {
            routes,
            config: RouterConfig::default(),
            cache: None,
            before_navigate: None,
            after_navigate: None,
            scroll_regions: Vec::new(),
        }
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Resource cache used by plan loaders
    pub fn cache(mut self, cache: ResourceCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Global hook run after the leave guards; may cancel
    pub fn before_navigate<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Navigation) + Send + Sync + 'static,
    {
        self.before_navigate = Some(Arc::new(f));
        self
    }

    /// Global hook awaited once a navigation committed
    pub fn after_navigate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&Navigation, &RevalidationHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.after_navigate = Some(Arc::new(
            move |nav: &Navigation, revalidation: &RevalidationHandle| -> BoxFuture<'static, ()> {
                Box::pin(f(nav, revalidation))
            },
        ));
        self
    }

    /// Track a named scroll region besides the window
    pub fn scroll_region(mut self, region: impl Into<String>) -> Self {
        self.scroll_regions.push(region.into());
        self
    }

    pub fn build(self, host: Host) -> Result<Navigator, RouteError> {
        let base = BasePath::new(&self.config.base)?;
        let table = RouteTable::compile(self.routes, self.config.case_insensitive)?;

        let mut scroll = ScrollCoordinator::new(Duration::from_millis(self.config.scroll_throttle_ms));
        for region in self.scroll_regions {
            scroll.track_region(region);
        }

        tracing::info!(
            "Navigator ready: {} route(s), base {}, hover preload {}",
            table.len(),
            base.as_str(),
            self.config.preload_on_hover
        );

        Ok(Navigator {
            inner: Arc::new(Inner {
                config: self.config,
                base,
                table,
                cache: self.cache,
                host,
                before_navigate: self.before_navigate,
                after_navigate: self.after_navigate,
                state: Mutex::new(EngineState::default()),
                scroll: Mutex::new(scroll),
                preloads: Preloads::default(),
                observers: Observers::default(),
                nav_seq: AtomicU64::new(0),
                nav_active: AtomicU64::new(0),
                hover: Mutex::new(None),
            }),
        })
    }
}

#[derive(Default)]
struct EngineState {
    current: Option<NavigationTarget>,
    route_idx: u64,
    hash_navigating: bool,
    navigating: bool,
    attached: bool,
}

struct Inner {
    config: RouterConfig,
    base: BasePath,
    table: RouteTable,
    cache: Option<ResourceCache>,
    host: Host,
    before_navigate: Option<BeforeNavigate>,
    after_navigate: Option<AfterNavigate>,
    state: Mutex<EngineState>,
    scroll: Mutex<ScrollCoordinator>,
    preloads: Preloads,
    observers: Observers,
    nav_seq: AtomicU64,
    nav_active: AtomicU64,
    hover: Mutex<Option<JoinHandle<()>>>,
}

/// Client-side navigation engine
///
/// Cheap to clone; clones drive the same engine. Host events are fed in
/// through the `on_*` methods, which do nothing until [`Navigator::attach`]
/// ran and again after [`Navigator::detach`].
#[derive(Clone)]
pub struct Navigator {
    inner: Arc<Inner>,
}

impl Navigator {
    pub fn builder(routes: Vec<RouteEntry>) -> NavigatorBuilder {
        NavigatorBuilder::new(routes)
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        lock(&self.inner.state)
    }

    fn state_key(&self) -> &str {
        &self.inner.config.state_key
    }

    // ---- lifecycle -------------------------------------------------------

    /// Start handling host events and navigate to the current location
    pub async fn attach(&self) -> NavigationOutcome {
        let history = &self.inner.host.history;
        history.set_manual_scroll_restoration();

        let href = history.href();
        let state = history.state();
        let mut entry = EntryState::read(&state, self.state_key());

        let stamped = {
            let mut st = self.state();
            st.attached = true;
            match entry.idx {
                Some(idx) => {
                    st.route_idx = idx;
                    false
                }
                None => {
                    entry.idx = Some(st.route_idx);
                    true
                }
            }
        };

        if stamped {
            history.replace_state(entry.write_into(&state, self.state_key()), &href);
            tracing::debug!("Stamped history index {:?} on {}", entry.idx, href);
        } else {
            tracing::debug!("Adopted history index {:?}", entry.idx);
        }

        tracing::info!("Navigator attached at {}", href);
        self.navigate(&href, true, NavigationType::Goto, None).await
    }

    /// Stop handling host events
    pub fn detach(&self) {
        self.state().attached = false;
        if let Some(pending) = lock(&self.inner.hover).take() {
            pending.abort();
        }
        self.inner.preloads.clear();
        tracing::info!("Navigator detached");
    }

    pub fn is_attached(&self) -> bool {
        self.state().attached
    }

    // ---- navigation ------------------------------------------------------

    /// Navigate to `url`, resolved against the current location
    ///
    /// A path starting with `/` that lies outside the base is prefixed with it.
    pub async fn goto(&self, url: &str, options: GotoOptions) -> NavigationOutcome {
        self.navigate(url, options.replace, NavigationType::Goto, None).await
    }

    async fn navigate(
        &self,
        raw: &str,
        replace: bool,
        kind: NavigationType,
        event: Option<NavEvent>,
    ) -> NavigationOutcome {
        let nav_id = self.inner.nav_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.nav_active.store(nav_id, Ordering::SeqCst);

        let Some((url, path)) = self.resolve(raw) else {
            tracing::debug!("Ignoring navigation to {}: invalid or outside base", raw);
            self.settle_navigating();
            return NavigationOutcome::Invalid;
        };
        tracing::debug!("Navigation #{} ({}) to {} replace={}", nav_id, kind, path, replace);

        let mut nav = Navigation::new(kind, self.current(), Some(url.clone())).with_event(event);
        self.run_leave_guards(&mut nav);
        if !nav.is_cancelled() {
            if let Some(before) = &self.inner.before_navigate {
                before(&mut nav);
            }
        }
        if nav.is_cancelled() {
            self.correct_history(&nav);
            self.settle_navigating();
            return NavigationOutcome::Cancelled;
        }

        self.state().navigating = true;
        self.publish();

        let is_pop = kind == NavigationType::PopState;
        self.save_scroll(!is_pop);

        let hit = self.inner.table.match_path(&path).await;
        if self.is_stale(nav_id) {
            return NavigationOutcome::Superseded;
        }

        let loaded = match &hit {
            Some(hit) => Some(match self.inner.preloads.take(&path) {
                Some(pending) => {
                    tracing::debug!("Using preloaded data for {}", path);
                    pending.await
                }
                None => self.load_chain(hit).await,
            }),
            None => None,
        };
        if self.is_stale(nav_id) {
            return NavigationOutcome::Superseded;
        }

        let first = kind == NavigationType::Goto && self.state().current.is_none();
        if !is_pop && !first {
            self.write_history(&url, replace, kind);
        }

        let (target, revalidation) = build_target(url.clone(), path, hit, loaded);
        let pop_entry = match &nav.event {
            Some(NavEvent::PopState(state)) => Some(EntryState::read(state, self.state_key())),
            _ => None,
        };

        let from = {
            let mut st = self.state();
            if is_pop {
                let fallback = st.route_idx.saturating_sub(1);
                st.route_idx = pop_entry.as_ref().and_then(|e| e.idx).unwrap_or(fallback);
            }
            st.current.replace(target.clone())
        };

        let mut done = Navigation::new(kind, from, Some(url)).with_event(nav.event.take());
        done.to = Some(target);

        if let Some(after) = &self.inner.after_navigate {
            after(&done, &revalidation).await;
        }
        if self.is_stale(nav_id) {
            return NavigationOutcome::Superseded;
        }

        self.inner.host.paint.after_paint().await;
        if self.is_stale(nav_id) {
            return NavigationOutcome::Superseded;
        }

        self.place_scroll(done.from.is_none(), pop_entry.as_ref());
        self.state().navigating = false;
        self.publish();

        tracing::debug!(
            "Navigation #{} committed: {} at index {}",
            nav_id,
            done.to.as_ref().and_then(|t| t.route_source()).unwrap_or("(not found)"),
            self.route_idx()
        );
        NavigationOutcome::Committed
    }

    fn is_stale(&self, nav_id: u64) -> bool {
        let stale = self.inner.nav_active.load(Ordering::SeqCst) != nav_id;
        if stale {
            tracing::debug!("Navigation #{} superseded", nav_id);
        }
        stale
    }

    /// Resolve into an absolute URL and a base-relative path
    fn resolve(&self, raw: &str) -> Option<(Url, String)> {
        let base = &self.inner.base;
        let raw = if raw.starts_with('/') && !raw.starts_with("//") && !base.contains(split_suffix(raw).0) {
            base.join(raw)
        } else {
            raw.to_string()
        };

        let here = Url::parse(&self.inner.host.history.href()).ok()?;
        let url = here.join(&raw).ok()?;
        let path = base.format(url.path())?;
        Some((url, path))
    }

    fn run_leave_guards(&self, nav: &mut Navigation) {
        let guards = nav
            .from
            .as_ref()
            .and_then(|from| from.route.as_ref())
            .map(|route| route.leave_guards())
            .unwrap_or_default();

        for guard in guards {
            guard(nav);
            if nav.is_cancelled() {
                tracing::debug!("Leave guard cancelled {} navigation", nav.kind);
                break;
            }
        }
    }

    /// Undo a traversal the platform already performed
    fn correct_history(&self, nav: &Navigation) {
        let Some(NavEvent::PopState(state)) = &nav.event else {
            return;
        };
        let Some(target_idx) = EntryState::read(state, self.state_key()).idx else {
            return;
        };

        let delta = target_idx as i64 - self.route_idx() as i64;
        if delta != 0 {
            tracing::debug!("Cancelled traversal; moving history by {}", -delta);
            self.inner.host.history.go(-delta);
        }
    }

    fn settle_navigating(&self) {
        let was_navigating = std::mem::replace(&mut self.state().navigating, false);
        if was_navigating {
            self.publish();
        }
    }

    fn write_history(&self, url: &Url, replace: bool, kind: NavigationType) {
        let history = &self.inner.host.history;
        let idx = self.route_idx() + u64::from(!replace);
        let entry = EntryState {
            idx: Some(idx),
            kind: Some(kind.as_str().to_string()),
            ..EntryState::default()
        };

        if replace {
            let payload = entry.write_into(&history.state(), self.state_key());
            history.replace_state(payload, url.as_str());
            tracing::debug!("History replace at index {}: {}", idx, url);
        } else {
            history.push_state(entry.write_into(&Value::Null, self.state_key()), url.as_str());
            tracing::debug!("History push to index {}: {}", idx, url);
        }

        self.state().route_idx = idx;
        if !replace {
            lock(&self.inner.scroll).clear_onward(idx);
        }
    }

    /// Load every level of the match chain concurrently
    async fn load_chain(&self, hit: &RouteMatch) -> Preloaded {
        let revalidation = RevalidationHandle::default();
        let cache = self.inner.cache.as_ref();
        let route = &hit.route;

        let levels = route
            .groups
            .iter()
            .map(|group| (ChainLevel::Group { layout: group.layout.clone() }, group.loader.clone()))
            .chain(std::iter::once((
                ChainLevel::Route {
                    pattern: route.source().to_string(),
                },
                route.hooks.loader.clone(),
            )));

        let chain = join_all(levels.map(|(level, loader)| {
            let params = &hit.params;
            let sink = revalidation.sink();
            async move {
                let data = match loader {
                    Some(loader) => loader.resolve(params, cache, Some(sink)).await,
                    None => LoadState::Empty,
                };
                ChainNode { level, data }
            }
        }))
        .await;

        tracing::debug!(
            "Loaded {} level(s) for {} ({} failed)",
            chain.len(),
            route.source(),
            chain.iter().filter(|node| node.data.is_failed()).count()
        );
        Preloaded { chain, revalidation }
    }

    // ---- preloading ------------------------------------------------------

    /// Load a URL's match-chain data ahead of navigating there
    ///
    /// Concurrent preloads of one path share a single load, which the next
    /// navigation to that path consumes. The current path and unmatched
    /// paths are skipped.
    pub async fn preload(&self, raw: &str) -> Option<Preloaded> {
        let Some((_, path)) = self.resolve(raw) else {
            tracing::debug!("Preload skipped: invalid url {}", raw);
            return None;
        };

        let current_path = self.state().current.as_ref().map(|c| c.path.clone());
        if current_path.as_deref() == Some(path.as_str()) {
            tracing::debug!("Preload skipped: {} is the current path", path);
            return None;
        }

        let Some(hit) = self.inner.table.match_path(&path).await else {
            tracing::debug!("Preload skipped: no route for {}", path);
            return None;
        };

        let navigator = self.clone();
        let (pending, joined) = self
            .inner
            .preloads
            .join_or_start(&path, move || -> BoxFuture<'static, Preloaded> {
                Box::pin(async move { navigator.load_chain(&hit).await })
            });

        if joined {
            tracing::debug!("Preload of {} joined an in-flight load", path);
        } else {
            tracing::debug!("Preload of {} started", path);
        }

        let loaded = pending.await;
        tracing::trace!("Preload of {} done", path);
        Some(loaded)
    }

    /// Pointer hovering (`immediate == false`) or pressing a link
    ///
    /// Hover preloads after the configured delay, and a newer hover replaces
    /// a pending one. Must be called within a Tokio runtime.
    pub fn on_pointer_intent(&self, link: &LinkClick, immediate: bool) {
        if !self.inner.config.preload_on_hover || !self.is_attached() || !self.intercepts(link, immediate) {
            return;
        }

        let navigator = self.clone();
        let href = link.href.clone();
        if immediate {
            tokio::spawn(async move {
                navigator.preload(&href).await;
            });
            return;
        }

        let delay = Duration::from_millis(self.inner.config.preload_delay_ms);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            navigator.preload(&href).await;
        });
        if let Some(pending) = lock(&self.inner.hover).replace(task) {
            pending.abort();
        }
    }

    // ---- shallow routing -------------------------------------------------

    /// Add a history entry without matching or loading anything
    pub fn push_state(&self, url: &str, state: Value) {
        self.commit_shallow(url, state, false);
    }

    /// Overwrite the current history entry without matching or loading anything
    pub fn replace_state(&self, url: &str, state: Value) {
        self.commit_shallow(url, state, true);
    }

    fn commit_shallow(&self, raw: &str, state: Value, replace: bool) {
        let history = &self.inner.host.history;
        let href = history.href();
        let raw = if raw.is_empty() { href.as_str() } else { raw };
        let url = match Url::parse(&href).and_then(|here| here.join(raw)) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Shallow {} to {} failed: {}", if replace { "replace" } else { "push" }, raw, e);
                return;
            }
        };

        let offsets = self.save_scroll(true);
        let idx = self.route_idx() + u64::from(!replace);

        let mut entry = EntryState::read(&state, self.state_key());
        entry.idx = Some(idx);
        entry.shallow = true;
        entry.scroll = Some(offsets.clone());
        let payload = entry.write_into(&state, self.state_key());

        if replace {
            history.replace_state(payload, url.as_str());
            tracing::debug!("Shallow replace at index {}: {}", idx, url);
        } else {
            history.push_state(payload, url.as_str());
            tracing::debug!("Shallow push to index {}: {}", idx, url);
        }

        {
            let mut scroll = lock(&self.inner.scroll);
            scroll.save(idx, offsets);
            if !replace {
                scroll.clear_onward(idx);
            }
        }
        {
            let mut st = self.state();
            st.route_idx = idx;
            if let Some(current) = st.current.as_mut() {
                move_to(current, url, &self.inner.base);
            }
        }
        self.publish();
    }

    // ---- host events -----------------------------------------------------

    /// Decide what a link activation should do, without doing it
    pub fn classify_click(&self, click: &LinkClick) -> ClickAction {
        if !self.is_attached() || !self.intercepts(click, true) {
            return ClickAction::Ignore;
        }

        let Ok(here) = Url::parse(&self.inner.host.history.href()) else {
            return ClickAction::Ignore;
        };
        let Ok(url) = here.join(&click.href) else {
            return ClickAction::Ignore;
        };

        let current_path = self.state().current.as_ref().map(|c| c.url.path().to_string());
        let fragment = url.fragment().filter(|f| !f.is_empty());
        if let (Some(fragment), Some(current_path)) = (fragment, current_path) {
            if url.path() == current_path {
                return if here.fragment().unwrap_or("") == fragment {
                    ClickAction::ScrollInPlace(fragment.to_string())
                } else {
                    ClickAction::FragmentNavigation
                };
            }
        }

        ClickAction::Navigate(click.href.clone())
    }

    /// Handle a link activation
    pub async fn on_click(&self, click: LinkClick) -> ClickAction {
        let action = self.classify_click(&click);
        match &action {
            ClickAction::Ignore => {}
            ClickAction::ScrollInPlace(fragment) => self.scroll_in_place(fragment),
            ClickAction::FragmentNavigation => {
                self.state().hash_navigating = true;
                self.save_scroll(true);
                tracing::debug!("Fragment navigation to {}", click.href);
            }
            ClickAction::Navigate(href) => {
                tracing::debug!("Intercepted link to {}", href);
                self.navigate(href, false, NavigationType::Link, Some(NavEvent::Click(click.clone())))
                    .await;
            }
        }
        action
    }

    fn scroll_in_place(&self, fragment: &str) {
        let viewport = &self.inner.host.viewport;
        let id = decode_fragment(fragment);
        if !viewport.scroll_to_anchor(&id) && id == "top" {
            viewport.scroll_to(WINDOW, ScrollOffset::TOP);
        }
        tracing::debug!("Same-fragment scroll to #{}", id);
    }

    fn intercepts(&self, link: &LinkClick, check_button: bool) -> bool {
        if link.default_prevented || link.modifiers || (check_button && link.button != 0) {
            return false;
        }
        if link.href.is_empty() || link.download || !link.same_origin {
            return false;
        }
        if link.target.as_deref().map_or(false, |t| !t.is_empty()) {
            return false;
        }
        !link.href.starts_with('/') || self.inner.base.contains(split_suffix(&link.href).0)
    }

    /// The platform moved through history; `state` is the entry landed on
    pub async fn on_pop_state(&self, state: Value) -> PopAction {
        {
            let st = self.state();
            if !st.attached || st.hash_navigating {
                tracing::trace!("Traversal ignored (attached: {}, fragment pending: {})", st.attached, st.hash_navigating);
                return PopAction::Ignored;
            }
        }

        let href = self.inner.host.history.href();
        let Ok(target) = Url::parse(&href) else {
            tracing::warn!("Traversal to unparsable location {}", href);
            return PopAction::Ignored;
        };
        let entry = EntryState::read(&state, self.state_key());
        let same_path = self
            .state()
            .current
            .as_ref()
            .map_or(false, |c| c.url.path() == target.path());

        if same_path || entry.shallow {
            tracing::debug!(
                "Traversal to {} without loading (same path: {}, shallow: {})",
                href,
                same_path,
                entry.shallow
            );
            {
                let mut st = self.state();
                let fallback = st.route_idx.saturating_sub(1);
                st.route_idx = entry.idx.unwrap_or(fallback);
                if let Some(current) = st.current.as_mut() {
                    move_to(current, target, &self.inner.base);
                }
            }
            self.inner.host.paint.after_paint().await;
            self.place_scroll(false, Some(&entry));
            self.publish();
            return PopAction::Shallow;
        }

        let outcome = self
            .navigate(&href, true, NavigationType::PopState, Some(NavEvent::PopState(state)))
            .await;
        PopAction::Navigated(outcome)
    }

    /// The platform changed the fragment of the current entry
    pub fn on_hash_change(&self) {
        if !self.is_attached() {
            return;
        }

        let history = &self.inner.host.history;
        let href = history.href();
        let pending = std::mem::replace(&mut self.state().hash_navigating, false);
        if pending {
            let prev = history.state();
            let mut entry = EntryState::read(&prev, self.state_key());
            let idx = self.route_idx() + 1;
            entry.idx = Some(idx);
            history.replace_state(entry.write_into(&prev, self.state_key()), &href);
            self.state().route_idx = idx;
            lock(&self.inner.scroll).clear_onward(idx);
            tracing::debug!("Fragment navigation stamped index {}", idx);
        }

        if let Ok(url) = Url::parse(&href) {
            let mut st = self.state();
            if let Some(current) = st.current.as_mut() {
                move_to(current, url, &self.inner.base);
            }
        }
        self.publish();
    }

    /// The document is unloading
    ///
    /// Persists the window offset for a reload and runs the leave guards.
    /// Returns true when a guard asked to keep the page.
    pub fn on_before_unload(&self) -> bool {
        if !self.is_attached() {
            return false;
        }

        let host = &self.inner.host;
        let href = host.history.href();
        let offset = host.viewport.scroll_offset(WINDOW).unwrap_or_default();
        match serde_json::to_string(&offset) {
            Ok(raw) => host
                .session
                .set(&format!("{}{}", self.inner.config.session_key_prefix, href), &raw),
            Err(e) => tracing::warn!("Could not persist scroll for {}: {}", href, e),
        }

        let mut nav = Navigation::new(NavigationType::Leave, self.current(), None)
            .with_event(Some(NavEvent::BeforeUnload));
        nav.will_unload = true;
        self.run_leave_guards(&mut nav);
        nav.is_cancelled()
    }

    /// A tracked region scrolled; records its offset for the current index
    pub fn on_scroll(&self, region: &str) {
        if !self.is_attached() {
            return;
        }
        let Some(offset) = self.inner.host.viewport.scroll_offset(region) else {
            return;
        };
        let idx = self.route_idx();
        if lock(&self.inner.scroll).record(idx, region, offset, Instant::now()) {
            tracing::trace!("Recorded {} scroll for index {}: {:?}", region, idx, offset);
        }
    }

    pub fn track_scroll_region(&self, region: impl Into<String>) {
        lock(&self.inner.scroll).track_region(region);
    }

    // ---- scroll ----------------------------------------------------------

    /// Capture offsets for the current index; `persist` also writes them
    /// into the current history entry
    fn save_scroll(&self, persist: bool) -> RegionOffsets {
        let idx = self.route_idx();
        let offsets = {
            let mut scroll = lock(&self.inner.scroll);
            let offsets = scroll.capture(&*self.inner.host.viewport);
            scroll.save(idx, offsets.clone());
            offsets
        };

        if persist {
            let history = &self.inner.host.history;
            let state = history.state();
            let mut entry = EntryState::read(&state, self.state_key());
            if entry.idx == Some(idx) {
                entry.scroll = Some(offsets.clone());
                history.replace_state(entry.write_into(&state, self.state_key()), &history.href());
            }
        }
        offsets
    }

    fn place_scroll(&self, initial: bool, pop: Option<&EntryState>) -> ScrollAction {
        let host = &self.inner.host;
        let href = host.history.href();
        let session = if initial { self.take_session_scroll(&href) } else { None };
        let url = Url::parse(&href).ok();
        let saved = pop.and_then(|entry| {
            let idx = self.route_idx();
            lock(&self.inner.scroll)
                .get(idx)
                .cloned()
                .or_else(|| entry.scroll.clone())
        });

        let action = scroll::place(
            &*host.viewport,
            Placement {
                session,
                fragment: url.as_ref().and_then(Url::fragment),
                saved,
            },
        );
        tracing::debug!("Scroll placement: {:?}", action);
        action
    }

    fn take_session_scroll(&self, href: &str) -> Option<ScrollOffset> {
        let session = &self.inner.host.session;
        let key = format!("{}{}", self.inner.config.session_key_prefix, href);
        let raw = session.get(&key)?;
        session.remove(&key);
        serde_json::from_str(&raw)
            .map_err(|e| tracing::warn!("Discarding saved scroll {}: {}", key, e))
            .ok()
    }

    // ---- observation -----------------------------------------------------

    fn publish(&self) {
        let snapshot = {
            let st = self.state();
            snapshot_of(&st)
        };
        self.inner.observers.publish(snapshot);
    }

    /// Register a listener; it receives the latest snapshot right away
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&RouteSnapshot) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    pub fn snapshot(&self) -> RouteSnapshot {
        self.inner.observers.last()
    }

    pub fn current(&self) -> Option<NavigationTarget> {
        self.state().current.clone()
    }

    /// History index of the current entry
    pub fn route_idx(&self) -> u64 {
        self.state().route_idx
    }

    pub fn is_navigating(&self) -> bool {
        self.state().navigating
    }

    // ---- passthroughs ----------------------------------------------------

    /// Base-relative form of `uri`; `None` outside the base
    pub fn format(&self, uri: &str) -> Option<String> {
        self.inner.base.format(uri)
    }

    pub async fn match_path(&self, path: &str) -> Option<RouteMatch> {
        self.inner.table.match_path(path).await
    }

    /// Drop cached resources by key, URL or tag; returns how many were removed
    pub fn invalidate<I, S>(&self, targets: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match &self.inner.cache {
            Some(cache) => cache.invalidate(targets),
            None => 0,
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.inner.table
    }

    pub fn cache(&self) -> Option<&ResourceCache> {
        self.inner.cache.as_ref()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }
}

fn build_target(
    url: Url,
    path: String,
    hit: Option<RouteMatch>,
    loaded: Option<Preloaded>,
) -> (NavigationTarget, RevalidationHandle) {
    match (hit, loaded) {
        (Some(hit), Some(loaded)) => {
            let error = loaded.chain.iter().find_map(|node| node.data.error().cloned());
            let target = NavigationTarget {
                url,
                path,
                params: hit.params,
                route: Some(hit.route),
                chain: loaded.chain,
                error,
            };
            (target, loaded.revalidation)
        }
        _ => {
            let error = LoadError::Status {
                url: url.to_string(),
                status: 404,
            };
            let target = NavigationTarget {
                url,
                path,
                params: Params::new(),
                route: None,
                chain: Vec::new(),
                error: Some(error),
            };
            (target, RevalidationHandle::default())
        }
    }
}

fn move_to(target: &mut NavigationTarget, url: Url, base: &BasePath) {
    if let Some(path) = base.format(url.path()) {
        target.path = path;
    }
    target.url = url;
}

fn snapshot_of(state: &EngineState) -> RouteSnapshot {
    match &state.current {
        Some(current) => RouteSnapshot {
            url: Some(current.url.to_string()),
            route: current.route_source().map(str::to_string),
            params: current.params.clone(),
            search: current
                .url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            is_navigating: state.navigating,
        },
        None => RouteSnapshot {
            is_navigating: state.navigating,
            ..RouteSnapshot::default()
        },
    }
}
