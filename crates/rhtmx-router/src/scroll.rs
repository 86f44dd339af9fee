//! Scroll/history-index coordinator
//!
//! Maps history-stack indices to per-region scroll offsets and decides where
//! to scroll after a navigation settles.

use crate::host::Viewport;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

/// Reserved region id for the whole-page viewport
pub const WINDOW: &str = "window";

/// A scroll position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

impl ScrollOffset {
    pub const TOP: ScrollOffset = ScrollOffset { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Offsets per region id
pub type RegionOffsets = BTreeMap<String, ScrollOffset>;

/// What scroll placement ended up doing
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollAction {
    /// Restored the position saved by the unload handler
    Session(ScrollOffset),
    /// Scrolled the fragment's anchor into view
    Anchor(String),
    /// Restored offsets saved for the target history index
    Restore(RegionOffsets),
    /// Scrolled the page to the top
    Top,
}

/// Inputs of scroll placement, in order of preference
#[derive(Debug, Clone, Default)]
pub struct Placement<'a> {
    /// Position saved before a reload (first navigation only)
    pub session: Option<ScrollOffset>,
    /// URL fragment without `#`
    pub fragment: Option<&'a str>,
    /// Offsets saved for the target index (history traversal only)
    pub saved: Option<RegionOffsets>,
}

/// Place scroll after a navigation
///
/// Prefers the session position, then the fragment's anchor, then the saved
/// offsets, then the top of the page.
pub fn place(viewport: &dyn Viewport, placement: Placement<'_>) -> ScrollAction {
    if let Some(offset) = placement.session {
        viewport.scroll_to(WINDOW, offset);
        return ScrollAction::Session(offset);
    }

    if let Some(fragment) = placement.fragment.filter(|f| !f.is_empty()) {
        let id = decode_fragment(fragment);
        if viewport.scroll_to_anchor(&id) {
            return ScrollAction::Anchor(id.into_owned());
        }
        tracing::trace!("No anchor for fragment #{}", id);
    }

    if let Some(saved) = placement.saved.filter(|s| !s.is_empty()) {
        for (region, offset) in &saved {
            viewport.scroll_to(region, *offset);
        }
        return ScrollAction::Restore(saved);
    }

    viewport.scroll_to(WINDOW, ScrollOffset::TOP);
    ScrollAction::Top
}

/// Percent-decode a fragment, keeping it as-is when it is not valid UTF-8
pub fn decode_fragment(fragment: &str) -> Cow<'_, str> {
    urlencoding::decode(fragment).unwrap_or(Cow::Borrowed(fragment))
}

/// Per-index scroll memory
#[derive(Debug)]
pub struct ScrollCoordinator {
    positions: BTreeMap<u64, RegionOffsets>,
    regions: BTreeSet<String>,
    throttle: Duration,
    last_capture: HashMap<String, Instant>,
}

impl ScrollCoordinator {
    pub fn new(throttle: Duration) -> Self {
        Self {
            positions: BTreeMap::new(),
            regions: BTreeSet::new(),
            throttle,
            last_capture: HashMap::new(),
        }
    }

    /// Track a named scroll region in addition to the window
    pub fn track_region(&mut self, region: impl Into<String>) {
        self.regions.insert(region.into());
    }

    /// All tracked region ids, window first
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        std::iter::once(WINDOW).chain(self.regions.iter().map(String::as_str))
    }

    /// Read the current offsets of every tracked region
    pub fn capture(&self, viewport: &dyn Viewport) -> RegionOffsets {
        self.regions()
            .filter_map(|region| viewport.scroll_offset(region).map(|o| (region.to_string(), o)))
            .collect()
    }

    pub fn save(&mut self, idx: u64, offsets: RegionOffsets) {
        tracing::trace!("Saving scroll for index {}: {:?}", idx, offsets);
        self.positions.insert(idx, offsets);
    }

    pub fn get(&self, idx: u64) -> Option<&RegionOffsets> {
        self.positions.get(&idx)
    }

    /// Forget everything recorded beyond `idx`
    pub fn clear_onward(&mut self, idx: u64) {
        self.positions.split_off(&(idx + 1));
    }

    /// Record one region's offset for `idx`, at most once per throttle interval
    ///
    /// Returns whether the offset was stored.
    pub fn record(&mut self, idx: u64, region: &str, offset: ScrollOffset, now: Instant) -> bool {
        let due = self
            .last_capture
            .get(region)
            .map_or(true, |last| now.duration_since(*last) >= self.throttle);
        if !due {
            return false;
        }

        self.last_capture.insert(region.to_string(), now);
        self.positions
            .entry(idx)
            .or_default()
            .insert(region.to_string(), offset);
        true
    }
}
