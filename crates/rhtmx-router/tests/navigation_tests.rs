//! Integration tests for the navigator
//!
//! Every test drives a [`MemoryHost`] the way a browser would: traversals go
//! through `MemoryHost::traverse` and the returned entry state is handed to
//! `on_pop_state`.

use pretty_assertions::assert_eq;
use rhtmx_loader::{fetch_fn, CacheConfig, CacheStrategy, LoadError, LoadPlan, Request, ResourceCache, ResourceSpec, Response};
use rhtmx_router::host::memory::MemoryHost;
use rhtmx_router::scroll::WINDOW;
use rhtmx_router::*;
use rstest::rstest;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

const STATE_KEY: &str = "__rhtmx";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn at(path: &str) -> String {
    format!("https://app.test{}", path)
}

fn leaf(pattern: &str) -> RouteEntry {
    RouteEntry::leaf(pattern, RouteHooks::new())
}

/// Leaf whose loader counts its runs and echoes the params
fn counting(pattern: &str, hits: &Arc<AtomicUsize>) -> RouteEntry {
    let hits = Arc::clone(hits);
    RouteEntry::leaf(
        pattern,
        RouteHooks::new().loader(Loader::direct(move |params: Params| {
            hits.fetch_add(1, Ordering::SeqCst);
            async move { Ok(json!({ "params": params })) }
        })),
    )
}

/// Leaf whose loader records the `id` param of every run
fn recording(pattern: &str, seen: &Arc<Mutex<Vec<String>>>) -> RouteEntry {
    let seen = Arc::clone(seen);
    RouteEntry::leaf(
        pattern,
        RouteHooks::new().loader(Loader::direct(move |params: Params| {
            seen.lock()
                .unwrap()
                .push(params.get_str("id").unwrap_or_default().to_string());
            async move { Ok(json!(params.get_str("id"))) }
        })),
    )
}

fn navigator(host: &Arc<MemoryHost>, routes: Vec<RouteEntry>) -> Navigator {
    Navigator::builder(routes)
        .build(Host::from_shared(Arc::clone(host)))
        .unwrap()
}

fn entry_state(state: &Value) -> EntryState {
    EntryState::read(state, STATE_KEY)
}

fn current_path(nav: &Navigator) -> String {
    nav.current().map(|c| c.path).unwrap_or_default()
}

// ============================================================================
// Attach and history writes
// ============================================================================

#[tokio::test]
async fn test_attach_stamps_index_without_new_entry() {
    init_tracing();
    let host = MemoryHost::new(at("/"));
    let nav = navigator(&host, vec![leaf("/")]);

    assert_eq!(nav.attach().await, NavigationOutcome::Committed);

    assert!(nav.is_attached());
    assert!(host.manual_scroll_restoration());
    assert_eq!(host.entries().len(), 1);
    assert_eq!(entry_state(&host.state()).idx, Some(0));
    assert_eq!(nav.route_idx(), 0);
    assert_eq!(nav.current().unwrap().route_source(), Some("/"));
}

#[tokio::test]
async fn test_push_and_replace_entries() {
    let host = MemoryHost::new(at("/"));
    let nav = navigator(&host, vec![leaf("/"), leaf("/users/:id"), leaf("/about")]);
    nav.attach().await;

    nav.goto("/users/7", GotoOptions::default()).await;
    assert_eq!(host.entries().len(), 2);
    assert_eq!(nav.route_idx(), 1);
    let entry = entry_state(&host.state());
    assert_eq!(entry.idx, Some(1));
    assert_eq!(entry.kind.as_deref(), Some("goto"));

    nav.goto("/about", GotoOptions::replace()).await;
    assert_eq!(host.entries().len(), 2);
    assert_eq!(host.href(), at("/about"));
    assert_eq!(nav.route_idx(), 1);

    let action = nav.on_click(LinkClick::new("/users/8")).await;
    assert_eq!(action, ClickAction::Navigate("/users/8".to_string()));
    assert!(action.prevents_default());
    assert_eq!(host.entries().len(), 3);
    assert_eq!(nav.route_idx(), 2);
    assert_eq!(entry_state(&host.state()).kind.as_deref(), Some("link"));
    assert_eq!(nav.current().unwrap().params.get_str("id"), Some("8"));
}

#[tokio::test]
async fn test_replace_keeps_caller_state() {
    let host = MemoryHost::new(at("/"));
    let nav = navigator(&host, vec![leaf("/"), leaf("/a"), leaf("/b")]);
    nav.attach().await;

    nav.replace_state("", json!({ "modal": "open" }));
    nav.goto("/a", GotoOptions::replace()).await;

    assert_eq!(host.state()["modal"], json!("open"));
    assert_eq!(entry_state(&host.state()).idx, Some(0));
}

#[tokio::test]
async fn test_base_path_prefixing() {
    let host = MemoryHost::new(at("/app"));
    let nav = Navigator::builder(vec![leaf("/"), leaf("/users/:id")])
        .config(RouterConfig::default().with_base("/app"))
        .build(Host::from_shared(Arc::clone(&host)))
        .unwrap();
    nav.attach().await;
    assert_eq!(current_path(&nav), "/");

    nav.goto("/users/1", GotoOptions::default()).await;
    assert_eq!(host.href(), at("/app/users/1"));
    assert_eq!(current_path(&nav), "/users/1");

    assert_eq!(nav.on_click(LinkClick::new("/elsewhere")).await, ClickAction::Ignore);
    assert_eq!(
        nav.on_click(LinkClick::new("/app/users/2")).await,
        ClickAction::Navigate("/app/users/2".to_string())
    );
    assert_eq!(nav.current().unwrap().params.get_str("id"), Some("2"));
    assert_eq!(nav.format("/app/users/3?x=1").as_deref(), Some("/users/3?x=1"));
}

// ============================================================================
// Link interception
// ============================================================================

#[rstest]
#[case::target(LinkClick::new("/a").with_target("_blank"))]
#[case::download(LinkClick::new("/a").with_download())]
#[case::modifier(LinkClick::new("/a").with_modifier())]
#[case::middle_button(LinkClick::new("/a").with_button(1))]
#[case::cross_origin(LinkClick::new("https://elsewhere.test/a").cross_origin())]
#[case::prevented(LinkClick::new("/a").prevented())]
#[case::empty_href(LinkClick::new(""))]
#[tokio::test]
async fn test_ignored_clicks(#[case] click: LinkClick) {
    let host = MemoryHost::new(at("/"));
    let nav = navigator(&host, vec![leaf("/"), leaf("/a")]);
    nav.attach().await;

    let action = nav.on_click(click).await;
    assert_eq!(action, ClickAction::Ignore);
    assert!(!action.prevents_default());
    assert_eq!(host.entries().len(), 1);
    assert_eq!(current_path(&nav), "/");
}

#[tokio::test]
async fn test_fragment_links() {
    let host = MemoryHost::new(at("/docs"));
    host.add_anchor("intro", 400.0);
    let nav = navigator(&host, vec![leaf("/docs")]);
    nav.attach().await;

    // new fragment: the platform follows it and reports popstate then hashchange
    let action = nav.on_click(LinkClick::new("#intro")).await;
    assert_eq!(action, ClickAction::FragmentNavigation);
    assert!(!action.prevents_default());

    host.follow_fragment(at("/docs#intro"));
    assert_eq!(nav.on_pop_state(Value::Null).await, PopAction::Ignored);
    nav.on_hash_change();

    assert_eq!(nav.route_idx(), 1);
    assert_eq!(entry_state(&host.state()).idx, Some(1));
    assert_eq!(nav.current().unwrap().url.fragment(), Some("intro"));

    // same fragment again: only scrolls
    host.set_scroll(WINDOW, 0.0, 0.0);
    let action = nav.on_click(LinkClick::new("#intro")).await;
    assert_eq!(action, ClickAction::ScrollInPlace("intro".to_string()));
    assert!(action.prevents_default());
    assert_eq!(host.scroll(WINDOW), ScrollOffset::new(0.0, 400.0));
    assert_eq!(host.entries().len(), 2);

    // back to the fragment-less entry of the same document
    let state = host.traverse(-1);
    assert_eq!(nav.on_pop_state(state).await, PopAction::Shallow);
    assert_eq!(nav.route_idx(), 0);
    assert_eq!(nav.current().unwrap().url.fragment(), None);
}

// ============================================================================
// Guards and cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_traversal_is_undone() {
    let host = MemoryHost::new(at("/"));
    let nav = navigator(
        &host,
        vec![
            leaf("/"),
            leaf("/a"),
            leaf("/b"),
            RouteEntry::leaf("/form", RouteHooks::new().before_leave(|nav| nav.cancel())),
        ],
    );
    nav.attach().await;
    for path in ["/a", "/b", "/form"] {
        nav.goto(path, GotoOptions::default()).await;
    }
    assert_eq!(nav.route_idx(), 3);

    // the platform jumps three entries back before the engine hears of it
    let state = host.traverse(-3);
    assert_eq!(host.index(), 0);

    let action = nav.on_pop_state(state).await;
    assert_eq!(action, PopAction::Navigated(NavigationOutcome::Cancelled));
    assert_eq!(host.go_calls(), vec![3]);
    assert_eq!(host.index(), 3);
    assert_eq!(host.href(), at("/form"));
    assert_eq!(nav.route_idx(), 3);
    assert_eq!(current_path(&nav), "/form");
}

#[tokio::test]
async fn test_leave_guards_run_innermost_first_then_global_hook() {
    let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let push = |label: &'static str| {
        let log = Arc::clone(&log);
        move |_: &mut Navigation| log.lock().unwrap().push(label)
    };

    let host = MemoryHost::new(at("/settings"));
    let nav = Navigator::builder(vec![
        RouteEntry::group(
            RouteGroup::new(vec![RouteEntry::leaf(
                "/settings",
                RouteHooks::new().before_leave(push("route")),
            )])
            .before_leave(push("group")),
        ),
        leaf("/other"),
    ])
    .before_navigate(push("global"))
    .build(Host::from_shared(Arc::clone(&host)))
    .unwrap();

    nav.attach().await;
    log.lock().unwrap().clear();

    assert_eq!(nav.goto("/other", GotoOptions::default()).await, NavigationOutcome::Committed);
    assert_eq!(*log.lock().unwrap(), vec!["route", "group", "global"]);
}

#[tokio::test]
async fn test_cancelling_guard_skips_remaining_hooks() {
    let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let push = |label: &'static str| {
        let log = Arc::clone(&log);
        move |_: &mut Navigation| log.lock().unwrap().push(label)
    };

    let host = MemoryHost::new(at("/settings"));
    let nav = Navigator::builder(vec![
        RouteEntry::group(
            RouteGroup::new(vec![RouteEntry::leaf(
                "/settings",
                RouteHooks::new().before_leave(|nav| nav.cancel()),
            )])
            .before_leave(push("group")),
        ),
        leaf("/other"),
    ])
    .before_navigate(push("global"))
    .build(Host::from_shared(Arc::clone(&host)))
    .unwrap();

    nav.attach().await;
    log.lock().unwrap().clear();

    assert_eq!(nav.goto("/other", GotoOptions::default()).await, NavigationOutcome::Cancelled);
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(host.entries().len(), 1);
    assert_eq!(current_path(&nav), "/settings");
    assert!(!nav.is_navigating());
}

#[tokio::test]
async fn test_before_navigate_can_cancel() {
    let host = MemoryHost::new(at("/"));
    let nav = Navigator::builder(vec![leaf("/"), leaf("/blocked")])
        .before_navigate(|nav| {
            if nav.destination.as_ref().map_or(false, |url| url.path() == "/blocked") {
                nav.cancel();
            }
        })
        .build(Host::from_shared(Arc::clone(&host)))
        .unwrap();
    nav.attach().await;

    assert_eq!(nav.goto("/blocked", GotoOptions::default()).await, NavigationOutcome::Cancelled);
    assert_eq!(host.entries().len(), 1);
    assert_eq!(current_path(&nav), "/");
    assert!(!nav.snapshot().is_navigating);
}

#[tokio::test]
async fn test_before_unload_consults_leave_guards() {
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&kinds);

    let host = MemoryHost::new(at("/editor"));
    let nav = navigator(
        &host,
        vec![RouteEntry::leaf(
            "/editor",
            RouteHooks::new().before_leave(move |nav| {
                sink.lock().unwrap().push((nav.kind, nav.will_unload, nav.destination.is_none()));
                nav.cancel();
            }),
        )],
    );
    nav.attach().await;

    assert!(nav.on_before_unload());
    assert_eq!(*kinds.lock().unwrap(), vec![(NavigationType::Leave, true, true)]);
}

// ============================================================================
// Latest wins
// ============================================================================

#[tokio::test]
async fn test_newer_navigation_supersedes_slow_one() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let slow = {
        let (started, release) = (Arc::clone(&started), Arc::clone(&release));
        RouteEntry::leaf(
            "/slow",
            RouteHooks::new().loader(Loader::direct(move |_| {
                let (started, release) = (Arc::clone(&started), Arc::clone(&release));
                async move {
                    started.notify_one();
                    release.notified().await;
                    Ok(json!("slow"))
                }
            })),
        )
    };

    let host = MemoryHost::new(at("/"));
    let nav = navigator(&host, vec![leaf("/"), slow, leaf("/fast")]);
    nav.attach().await;

    let pending = tokio::spawn({
        let nav = nav.clone();
        async move { nav.goto("/slow", GotoOptions::default()).await }
    });
    started.notified().await;

    assert_eq!(nav.goto("/fast", GotoOptions::default()).await, NavigationOutcome::Committed);
    release.notify_one();
    assert_eq!(pending.await.unwrap(), NavigationOutcome::Superseded);

    assert_eq!(current_path(&nav), "/fast");
    assert_eq!(host.entries().len(), 2);
    assert_eq!(host.href(), at("/fast"));
    assert!(!nav.is_navigating());
}

#[tokio::test]
async fn test_navigation_superseded_during_after_navigate() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let host = MemoryHost::new(at("/"));
    host.add_anchor("deep", 900.0);
    let nav = Navigator::builder(vec![leaf("/"), leaf("/slow"), leaf("/fast")])
        .after_navigate({
            let (entered, release) = (Arc::clone(&entered), Arc::clone(&release));
            move |nav: &Navigation, _: &RevalidationHandle| {
                let blocks = nav.to.as_ref().map_or(false, |to| to.path == "/slow");
                let (entered, release) = (Arc::clone(&entered), Arc::clone(&release));
                async move {
                    if blocks {
                        entered.notify_one();
                        release.notified().await;
                    }
                }
            }
        })
        .build(Host::from_shared(Arc::clone(&host)))
        .unwrap();
    nav.attach().await;

    let pending = tokio::spawn({
        let nav = nav.clone();
        async move { nav.goto("/slow#deep", GotoOptions::default()).await }
    });
    entered.notified().await;
    assert_eq!(current_path(&nav), "/slow");
    assert!(nav.is_navigating());

    assert_eq!(nav.goto("/fast", GotoOptions::default()).await, NavigationOutcome::Committed);
    host.set_scroll(WINDOW, 0.0, 555.0);

    release.notify_one();
    assert_eq!(pending.await.unwrap(), NavigationOutcome::Superseded);

    // the superseded attempt never placed scroll for its anchor
    assert_eq!(host.scroll(WINDOW).y, 555.0);
    assert_eq!(current_path(&nav), "/fast");
    assert_eq!(host.href(), at("/fast"));
    assert!(!nav.is_navigating());
}

/// Paint scheduler whose next paint waits for `release` once armed
#[derive(Default)]
struct GatedPaint {
    armed: std::sync::atomic::AtomicBool,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl PaintScheduler for GatedPaint {
    fn after_paint(&self) -> BoxFuture<'static, ()> {
        if !self.armed.swap(false, Ordering::SeqCst) {
            return Box::pin(async {});
        }
        let (entered, release) = (Arc::clone(&self.entered), Arc::clone(&self.release));
        Box::pin(async move {
            entered.notify_one();
            release.notified().await;
        })
    }
}

#[tokio::test]
async fn test_navigation_superseded_while_waiting_for_paint() {
    let host = MemoryHost::new(at("/"));
    host.add_anchor("deep", 900.0);
    let paint = Arc::new(GatedPaint::default());
    let platform = Host {
        paint: paint.clone(),
        ..Host::from_shared(Arc::clone(&host))
    };
    let nav = Navigator::builder(vec![leaf("/"), leaf("/slow"), leaf("/fast")])
        .build(platform)
        .unwrap();
    nav.attach().await;

    paint.armed.store(true, Ordering::SeqCst);
    let pending = tokio::spawn({
        let nav = nav.clone();
        async move { nav.goto("/slow#deep", GotoOptions::default()).await }
    });
    paint.entered.notified().await;

    assert_eq!(nav.goto("/fast", GotoOptions::default()).await, NavigationOutcome::Committed);
    host.set_scroll(WINDOW, 0.0, 555.0);

    paint.release.notify_one();
    assert_eq!(pending.await.unwrap(), NavigationOutcome::Superseded);

    assert_eq!(host.scroll(WINDOW).y, 555.0);
    assert_eq!(current_path(&nav), "/fast");
    assert!(!nav.is_navigating());
}

// ============================================================================
// Targets and loaders
// ============================================================================

#[tokio::test]
async fn test_unmatched_path_commits_not_found() {
    let host = MemoryHost::new(at("/"));
    let nav = navigator(&host, vec![leaf("/")]);
    nav.attach().await;

    assert_eq!(nav.goto("/missing", GotoOptions::default()).await, NavigationOutcome::Committed);

    let current = nav.current().unwrap();
    assert!(current.is_not_found());
    assert_eq!(current.error.as_ref().and_then(LoadError::status), Some(404));
    assert_eq!(host.entries().len(), 2);
    assert_eq!(nav.snapshot().route, None);
}

#[tokio::test]
async fn test_loader_failure_is_captured() {
    let host = MemoryHost::new(at("/"));
    let nav = navigator(
        &host,
        vec![
            leaf("/"),
            RouteEntry::leaf(
                "/broken",
                RouteHooks::new().loader(Loader::direct(|_| async { Err(LoadError::loader("boom")) })),
            ),
        ],
    );
    nav.attach().await;

    assert_eq!(nav.goto("/broken", GotoOptions::default()).await, NavigationOutcome::Committed);

    let current = nav.current().unwrap();
    assert_eq!(current.route_source(), Some("/broken"));
    assert_eq!(current.error, Some(LoadError::loader("boom")));
    assert!(current.chain.last().unwrap().data.is_failed());
    assert_eq!(current.data(), None);
}

#[tokio::test]
async fn test_chain_lists_groups_then_route() {
    let host = MemoryHost::new(at("/dash"));
    let nav = navigator(
        &host,
        vec![RouteEntry::group(
            RouteGroup::new(vec![RouteEntry::group(
                RouteGroup::new(vec![RouteEntry::leaf(
                    "/dash",
                    RouteHooks::new().loader(Loader::direct(|_| async { Ok(json!("page")) })),
                )])
                .layout("panel"),
            )])
            .layout("app")
            .loader(Loader::direct(|_| async { Ok(json!("layout")) })),
        )],
    );
    nav.attach().await;

    let current = nav.current().unwrap();
    assert_eq!(
        current.chain,
        vec![
            ChainNode {
                level: ChainLevel::Group {
                    layout: Some("app".to_string())
                },
                data: LoadState::Loaded(json!("layout")),
            },
            ChainNode {
                level: ChainLevel::Group {
                    layout: Some("panel".to_string())
                },
                data: LoadState::Empty,
            },
            ChainNode {
                level: ChainLevel::Route {
                    pattern: "/dash".to_string()
                },
                data: LoadState::Loaded(json!("page")),
            },
        ]
    );
    assert_eq!(current.data(), Some(&json!("page")));
    assert_eq!(current.error, None);
}

// ============================================================================
// Preloading
// ============================================================================

#[tokio::test]
async fn test_concurrent_preloads_share_one_load() {
    let hits = Arc::new(AtomicUsize::new(0));
    let host = MemoryHost::new(at("/"));
    let nav = navigator(&host, vec![leaf("/"), counting("/users/:id", &hits)]);
    nav.attach().await;

    let (first, second) = tokio::join!(nav.preload("/users/1"), nav.preload("/users/1"));
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.chain, second.chain);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // the navigation consumes the preload instead of loading again
    nav.goto("/users/1", GotoOptions::default()).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(
        nav.current().unwrap().data(),
        Some(&json!({ "params": { "id": "1" } }))
    );

    nav.goto("/", GotoOptions::default()).await;
    nav.goto("/users/1", GotoOptions::default()).await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_detach_drops_pending_preloads() {
    let hits = Arc::new(AtomicUsize::new(0));
    let host = MemoryHost::new(at("/"));
    let nav = navigator(&host, vec![leaf("/"), counting("/users/:id", &hits)]);
    nav.attach().await;

    nav.preload("/users/1").await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    nav.detach();
    nav.goto("/users/1", GotoOptions::default()).await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_preload_skips_current_and_unmatched_paths() {
    let hits = Arc::new(AtomicUsize::new(0));
    let host = MemoryHost::new(at("/users/1"));
    let nav = navigator(&host, vec![counting("/users/:id", &hits)]);
    nav.attach().await;

    assert!(nav.preload("/users/1").await.is_none());
    assert!(nav.preload("/nowhere").await.is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_hover_preload_is_debounced() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let host = MemoryHost::new(at("/"));
    let nav = navigator(&host, vec![leaf("/"), recording("/users/:id", &seen)]);
    nav.attach().await;

    nav.on_pointer_intent(&LinkClick::new("/users/1"), false);
    nav.on_pointer_intent(&LinkClick::new("/users/2"), false);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*seen.lock().unwrap(), vec!["2".to_string()]);

    nav.goto("/users/2", GotoOptions::default()).await;
    assert_eq!(*seen.lock().unwrap(), vec!["2".to_string()]);

    // pressing preloads right away
    nav.on_pointer_intent(&LinkClick::new("/users/3"), true);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(*seen.lock().unwrap(), vec!["2".to_string(), "3".to_string()]);
}

#[tokio::test]
async fn test_hover_preload_can_be_disabled() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let host = MemoryHost::new(at("/"));
    let nav = Navigator::builder(vec![leaf("/"), recording("/users/:id", &seen)])
        .config(RouterConfig::default().with_preload_on_hover(false))
        .build(Host::from_shared(Arc::clone(&host)))
        .unwrap();
    nav.attach().await;

    nav.on_pointer_intent(&LinkClick::new("/users/1"), false);
    nav.on_pointer_intent(&LinkClick::new("/users/2"), true);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(seen.lock().unwrap().is_empty());
}

// ============================================================================
// Shallow routing
// ============================================================================

#[tokio::test]
async fn test_shallow_entries_cycle_without_loading() {
    let hits = Arc::new(AtomicUsize::new(0));
    let host = MemoryHost::new(at("/search"));
    let nav = navigator(&host, vec![counting("/search", &hits)]);
    nav.attach().await;

    let published = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&published);
    nav.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    nav.push_state("?q=a", json!({ "modal": true }));
    nav.push_state("?q=b", Value::Null);
    assert_eq!(nav.route_idx(), 2);
    assert_eq!(host.entries().len(), 3);

    let entries = host.entries();
    assert_eq!(entries[1].state["modal"], json!(true));
    assert!(entry_state(&entries[1].state).shallow);

    let search = |nav: &Navigator| nav.snapshot().search;

    assert_eq!(nav.on_pop_state(host.traverse(-1)).await, PopAction::Shallow);
    assert_eq!(nav.route_idx(), 1);
    assert_eq!(search(&nav), vec![("q".to_string(), "a".to_string())]);

    assert_eq!(nav.on_pop_state(host.traverse(-1)).await, PopAction::Shallow);
    assert_eq!(nav.route_idx(), 0);
    assert!(search(&nav).is_empty());

    assert_eq!(nav.on_pop_state(host.traverse(2)).await, PopAction::Shallow);
    assert_eq!(nav.route_idx(), 2);
    assert_eq!(search(&nav), vec![("q".to_string(), "b".to_string())]);

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    // replayed snapshot, two pushes, three traversals
    assert_eq!(published.load(Ordering::SeqCst), 6);
}

// ============================================================================
// Scroll
// ============================================================================

#[tokio::test]
async fn test_back_and_forward_restore_scroll() {
    let host = MemoryHost::new(at("/"));
    let nav = navigator(&host, vec![leaf("/"), leaf("/list"), leaf("/detail")]);
    nav.attach().await;

    nav.goto("/list", GotoOptions::default()).await;
    host.set_scroll(WINDOW, 0.0, 300.0);
    nav.goto("/detail", GotoOptions::default()).await;
    assert_eq!(host.scroll(WINDOW), ScrollOffset::TOP);

    let action = nav.on_pop_state(host.traverse(-1)).await;
    assert_eq!(action, PopAction::Navigated(NavigationOutcome::Committed));
    assert_eq!(nav.route_idx(), 1);
    assert_eq!(current_path(&nav), "/list");
    assert_eq!(host.scroll(WINDOW), ScrollOffset::new(0.0, 300.0));

    nav.on_pop_state(host.traverse(1)).await;
    assert_eq!(nav.route_idx(), 2);
    assert_eq!(host.scroll(WINDOW), ScrollOffset::TOP);
}

#[tokio::test]
async fn test_scroll_survives_reload_through_entry_state() {
    let routes = || vec![leaf("/"), leaf("/list"), leaf("/detail")];
    let host = MemoryHost::new(at("/"));

    let before = navigator(&host, routes());
    before.attach().await;
    before.goto("/list", GotoOptions::default()).await;
    host.set_scroll(WINDOW, 0.0, 300.0);
    before.goto("/detail", GotoOptions::default()).await;
    before.detach();

    // a fresh navigator on the same history, as after a reload
    let after = navigator(&host, routes());
    after.attach().await;
    assert_eq!(after.route_idx(), 2);
    assert_eq!(host.entries().len(), 3);

    after.on_pop_state(host.traverse(-1)).await;
    assert_eq!(after.route_idx(), 1);
    assert_eq!(host.scroll(WINDOW), ScrollOffset::new(0.0, 300.0));
}

#[tokio::test]
async fn test_reload_restores_session_scroll() {
    let host = MemoryHost::new(at("/"));
    let key = format!("__rhtmx_scroll:{}", at("/"));

    let before = navigator(&host, vec![leaf("/")]);
    before.attach().await;
    host.set_scroll(WINDOW, 0.0, 750.0);
    assert!(!before.on_before_unload());
    assert!(host.get(&key).is_some());
    before.detach();

    host.set_scroll(WINDOW, 0.0, 0.0);
    let after = navigator(&host, vec![leaf("/")]);
    after.attach().await;

    assert_eq!(host.scroll(WINDOW), ScrollOffset::new(0.0, 750.0));
    assert_eq!(host.get(&key), None);
}

#[tokio::test]
async fn test_fragment_target_scrolls_to_anchor() {
    let host = MemoryHost::new(at("/"));
    host.add_anchor("faq", 900.0);
    let nav = navigator(&host, vec![leaf("/"), leaf("/help")]);
    nav.attach().await;

    nav.goto("/help#faq", GotoOptions::default()).await;
    assert_eq!(host.scroll(WINDOW), ScrollOffset::new(0.0, 900.0));
}

#[tokio::test]
async fn test_tracked_region_is_restored() {
    let host = MemoryHost::new(at("/"));
    let nav = Navigator::builder(vec![leaf("/"), leaf("/list"), leaf("/detail")])
        .scroll_region("sidebar")
        .build(Host::from_shared(Arc::clone(&host)))
        .unwrap();
    nav.attach().await;

    nav.goto("/list", GotoOptions::default()).await;
    host.set_scroll("sidebar", 0.0, 120.0);
    nav.on_scroll("sidebar");
    nav.goto("/detail", GotoOptions::default()).await;
    host.set_scroll("sidebar", 0.0, 0.0);

    nav.on_pop_state(host.traverse(-1)).await;
    assert_eq!(host.scroll("sidebar"), ScrollOffset::new(0.0, 120.0));
}

// ============================================================================
// Lifecycle and observation
// ============================================================================

#[tokio::test]
async fn test_detached_navigator_ignores_host_events() {
    let host = MemoryHost::new(at("/"));
    let nav = navigator(
        &host,
        vec![
            RouteEntry::leaf("/", RouteHooks::new().before_leave(|nav| nav.cancel())),
            leaf("/a"),
        ],
    );
    nav.attach().await;
    nav.detach();

    assert!(!nav.is_attached());
    assert_eq!(nav.on_click(LinkClick::new("/a")).await, ClickAction::Ignore);
    assert_eq!(nav.on_pop_state(Value::Null).await, PopAction::Ignored);
    assert!(!nav.on_before_unload());
    assert_eq!(host.entries().len(), 1);
}

#[tokio::test]
async fn test_snapshots_follow_navigation() {
    let host = MemoryHost::new(at("/"));
    let nav = navigator(&host, vec![leaf("/"), leaf("/users/:id")]);

    let flags = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&flags);
    let id = nav.subscribe(move |snapshot| sink.lock().unwrap().push(snapshot.is_navigating));

    nav.attach().await;
    nav.goto("/users/5?tab=posts", GotoOptions::default()).await;

    assert_eq!(*flags.lock().unwrap(), vec![false, true, false, true, false]);

    let snapshot = nav.snapshot();
    assert_eq!(snapshot.url.as_deref(), Some("https://app.test/users/5?tab=posts"));
    assert_eq!(snapshot.route.as_deref(), Some("/users/:id"));
    assert_eq!(snapshot.params.get_str("id"), Some("5"));
    assert_eq!(snapshot.search, vec![("tab".to_string(), "posts".to_string())]);

    assert!(nav.unsubscribe(id));
    nav.goto("/", GotoOptions::default()).await;
    assert_eq!(flags.lock().unwrap().len(), 5);
}

// ============================================================================
// Resource cache
// ============================================================================

/// Leave for the root and come back
async fn revisit(nav: &Navigator, path: &str) {
    nav.goto("/", GotoOptions::default()).await;
    nav.goto(path, GotoOptions::default()).await;
}

fn api_cache<F, Fut>(fetch: F) -> ResourceCache
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Response, LoadError>> + Send + 'static,
{
    ResourceCache::new(
        CacheConfig {
            base_url: Some("https://api.test".to_string()),
            ..CacheConfig::default()
        },
        Arc::new(fetch_fn(fetch)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_background_refresh_reaches_after_navigate_hook() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache = api_cache(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok(Response::json(&json!(if n < 2 { "v1" } else { "v2" }))) }
    });

    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);

    let host = MemoryHost::new(at("/"));
    let nav = Navigator::builder(vec![
        leaf("/"),
        RouteEntry::leaf(
            "/feed",
            RouteHooks::new().loader(Loader::plan(|_| {
                LoadPlan::new().with("feed", ResourceSpec::get("/api/feed").ttl(Duration::ZERO))
            })),
        ),
    ])
    .cache(cache)
    .after_navigate(move |_nav: &Navigation, revalidation: &RevalidationHandle| {
        let sink = Arc::clone(&sink);
        revalidation.on_revalidate(move |update| sink.lock().unwrap().push(update.value));
        async {}
    })
    .build(Host::from_shared(Arc::clone(&host)))
    .unwrap();
    nav.attach().await;

    nav.goto("/feed", GotoOptions::default()).await;
    assert_eq!(nav.current().unwrap().data(), Some(&json!({ "feed": "v1" })));

    // stale entry served, refresh finds the same data
    revisit(&nav, "/feed").await;
    nav.cache().unwrap().settle().await;
    assert!(updates.lock().unwrap().is_empty());

    // stale entry served, refresh finds newer data
    revisit(&nav, "/feed").await;
    assert_eq!(nav.current().unwrap().data(), Some(&json!({ "feed": "v1" })));
    nav.cache().unwrap().settle().await;
    assert_eq!(*updates.lock().unwrap(), vec![json!("v2")]);

    let stats = nav.cache().unwrap().stats();
    assert_eq!(stats.fetches, 3);
    assert_eq!(stats.revalidations, 1);
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache = api_cache(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok(Response::json(&json!(["ada", "linus"]))) }
    });

    let host = MemoryHost::new(at("/"));
    let nav = Navigator::builder(vec![
        leaf("/"),
        RouteEntry::leaf(
            "/users",
            RouteHooks::new().loader(Loader::plan(|_| {
                LoadPlan::new().with(
                    "users",
                    ResourceSpec::get("/api/users")
                        .strategy(CacheStrategy::CacheFirst)
                        .tag("users"),
                )
            })),
        ),
    ])
    .cache(cache)
    .build(Host::from_shared(Arc::clone(&host)))
    .unwrap();
    nav.attach().await;

    revisit(&nav, "/users").await;
    revisit(&nav, "/users").await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(nav.invalidate(["users"]), 1);
    revisit(&nav, "/users").await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert_eq!(nav.invalidate(["/api/users"]), 1);
    assert_eq!(nav.invalidate(["/api/users"]), 0);
    revisit(&nav, "/users").await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
