//! In-memory host
//!
//! Keeps a history stack, scroll offsets, anchors and a session store in
//! memory. Traversals through [`MemoryHost::traverse`] return the entry state
//! the platform would hand to a popstate listener, so tests drive the engine
//! exactly like a browser would.

use super::{HistoryStack, PaintScheduler, SessionStore, Viewport};
use crate::lock;
use crate::scroll::{ScrollOffset, WINDOW};
use crate::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub url: String,
    pub state: Value,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: Vec<HistoryEntry>,
    index: usize,
    go_calls: Vec<i64>,
    manual_scroll: bool,
    offsets: HashMap<String, ScrollOffset>,
    anchors: HashMap<String, f64>,
    session: HashMap<String, String>,
}

#[derive(Debug)]
pub struct MemoryHost {
    inner: Mutex<MemoryState>,
}

impl MemoryHost {
    /// A host whose history holds one entry at `href`
    pub fn new(href: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(MemoryState {
                entries: vec![HistoryEntry {
                    url: href.into(),
                    state: Value::Null,
                }],
                ..MemoryState::default()
            }),
        })
    }

    /// Move through history like the back/forward buttons
    ///
    /// Returns the state of the entry landed on. The move is clamped to the
    /// ends of the stack.
    pub fn traverse(&self, delta: i64) -> Value {
        let mut state = lock(&self.inner);
        state.index = clamp_index(state.index, delta, state.entries.len());
        state.entries[state.index].state.clone()
    }

    /// Follow a same-document fragment link, adding an entry with no state
    pub fn follow_fragment(&self, url: impl Into<String>) {
        let mut state = lock(&self.inner);
        push_entry(&mut state, url.into(), Value::Null);
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        lock(&self.inner).entries.clone()
    }

    /// Position of the current entry in the stack
    pub fn index(&self) -> usize {
        lock(&self.inner).index
    }

    /// Deltas passed to [`HistoryStack::go`], in call order
    pub fn go_calls(&self) -> Vec<i64> {
        lock(&self.inner).go_calls.clone()
    }

    pub fn manual_scroll_restoration(&self) -> bool {
        lock(&self.inner).manual_scroll
    }

    pub fn set_scroll(&self, region: &str, x: f64, y: f64) {
        lock(&self.inner)
            .offsets
            .insert(region.to_string(), ScrollOffset::new(x, y));
    }

    /// Current offset of a region (top when never scrolled)
    pub fn scroll(&self, region: &str) -> ScrollOffset {
        lock(&self.inner)
            .offsets
            .get(region)
            .copied()
            .unwrap_or_default()
    }

    /// Register an element id at a vertical position of the window
    pub fn add_anchor(&self, id: impl Into<String>, y: f64) {
        lock(&self.inner).anchors.insert(id.into(), y);
    }
}

fn clamp_index(index: usize, delta: i64, len: usize) -> usize {
    let target = index as i64 + delta;
    target.clamp(0, len.saturating_sub(1) as i64) as usize
}

fn push_entry(state: &mut MemoryState, url: String, value: Value) {
    let keep = state.index + 1;
    state.entries.truncate(keep);
    state.entries.push(HistoryEntry { url, state: value });
    state.index = keep;
}

impl HistoryStack for MemoryHost {
    fn href(&self) -> String {
        let state = lock(&self.inner);
        state.entries[state.index].url.clone()
    }

    fn state(&self) -> Value {
        let state = lock(&self.inner);
        state.entries[state.index].state.clone()
    }

    fn push_state(&self, value: Value, url: &str) {
        let mut state = lock(&self.inner);
        push_entry(&mut state, url.to_string(), value);
    }

    fn replace_state(&self, value: Value, url: &str) {
        let mut state = lock(&self.inner);
        let index = state.index;
        state.entries[index] = HistoryEntry {
            url: url.to_string(),
            state: value,
        };
    }

    fn go(&self, delta: i64) {
        let mut state = lock(&self.inner);
        state.go_calls.push(delta);
        state.index = clamp_index(state.index, delta, state.entries.len());
    }

    fn set_manual_scroll_restoration(&self) {
        lock(&self.inner).manual_scroll = true;
    }
}

impl Viewport for MemoryHost {
    fn scroll_offset(&self, region: &str) -> Option<ScrollOffset> {
        Some(self.scroll(region))
    }

    fn scroll_to(&self, region: &str, offset: ScrollOffset) {
        lock(&self.inner).offsets.insert(region.to_string(), offset);
    }

    fn scroll_to_anchor(&self, id: &str) -> bool {
        let mut state = lock(&self.inner);
        match state.anchors.get(id).copied() {
            Some(y) => {
                state
                    .offsets
                    .insert(WINDOW.to_string(), ScrollOffset::new(0.0, y));
                true
            }
            None => false,
        }
    }
}

impl SessionStore for MemoryHost {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.inner).session.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        lock(&self.inner)
            .session
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        lock(&self.inner).session.remove(key);
    }
}

impl PaintScheduler for MemoryHost {
    fn after_paint(&self) -> BoxFuture<'static, ()> {
        Box::pin(tokio::task::yield_now())
    }
}
