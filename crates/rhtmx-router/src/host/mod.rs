//! Host platform adapters
//!
//! The navigation engine never touches a browser directly. It talks to the
//! session history, the viewport, a session store and the paint scheduler
//! through these traits; [`memory::MemoryHost`] implements all of them in
//! memory.

pub mod memory;

use crate::scroll::ScrollOffset;
use crate::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// The session history stack
pub trait HistoryStack: Send + Sync {
    /// Absolute URL of the current entry
    fn href(&self) -> String;

    /// State payload of the current entry (`null` when none)
    fn state(&self) -> Value;

    /// Add an entry after the current one, discarding forward entries
    fn push_state(&self, state: Value, url: &str);

    /// Overwrite the current entry
    fn replace_state(&self, state: Value, url: &str);

    /// Traverse by `delta` entries without notifying the engine
    fn go(&self, delta: i64);

    /// Take over scroll restoration from the platform
    fn set_manual_scroll_restoration(&self);
}

/// Scrollable regions of the document
pub trait Viewport: Send + Sync {
    /// Current offset of a region; `None` when the region does not exist
    fn scroll_offset(&self, region: &str) -> Option<ScrollOffset>;

    fn scroll_to(&self, region: &str, offset: ScrollOffset);

    /// Scroll the element with this id into view; `false` when there is none
    fn scroll_to_anchor(&self, id: &str) -> bool;
}

/// Key/value storage surviving a reload of the same tab
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Resolves once the freshly committed view has been painted
pub trait PaintScheduler: Send + Sync {
    fn after_paint(&self) -> BoxFuture<'static, ()>;
}

/// The set of adapters a navigator runs against
#[derive(Clone)]
pub struct Host {
    pub history: Arc<dyn HistoryStack>,
    pub viewport: Arc<dyn Viewport>,
    pub session: Arc<dyn SessionStore>,
    pub paint: Arc<dyn PaintScheduler>,
}

impl Host {
    /// Use one platform object for every adapter
    pub fn from_shared<T>(platform: Arc<T>) -> Self
    where
        T: HistoryStack + Viewport + SessionStore + PaintScheduler + 'static,
    {
        Self {
            history: platform.clone(),
            viewport: platform.clone(),
            session: platform.clone(),
            paint: platform,
        }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("href", &self.history.href())
            .finish_non_exhaustive()
    }
}

/// An activation of (or pointer intent on) an anchor element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkClick {
    /// The anchor's `href` attribute as written
    pub href: String,
    /// The anchor's `target` attribute
    pub target: Option<String>,
    /// Whether the anchor carries `download`
    pub download: bool,
    /// Whether the resolved href shares the document's origin
    pub same_origin: bool,
    /// Pointer button; 0 is the primary button
    pub button: u16,
    /// Any of meta, ctrl, shift or alt held
    pub modifiers: bool,
    /// Whether some other handler already called `preventDefault`
    pub default_prevented: bool,
}

impl LinkClick {
    /// A plain primary-button click on a same-origin link
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            target: None,
            download: false,
            same_origin: true,
            button: 0,
            modifiers: false,
            default_prevented: false,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_download(mut self) -> Self {
        self.download = true;
        self
    }

    pub fn cross_origin(mut self) -> Self {
        self.same_origin = false;
        self
    }

    pub fn with_button(mut self, button: u16) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifier(mut self) -> Self {
        self.modifiers = true;
        self
    }

    pub fn prevented(mut self) -> Self {
        self.default_prevented = true;
        self
    }
}
