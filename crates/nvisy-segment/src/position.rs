//! Scroll target resolution.
//!
//! The rendering surface only scrolls when the target it receives differs
//! from the previous one. Repeating a "locate" on the same chunk must still
//! scroll, so every request carries a sequence number that only grows.

use serde::{Deserialize, Serialize};

use crate::geometry::LabelKey;
use crate::label::{Label, LabelMap};

/// Which active label the surface scrolls to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ScrollAnchor {
    /// First active label in partition payload order.
    #[default]
    PartitionOrder,
    /// Top-most active label of the lowest page, left-most on ties.
    ReadingOrder,
}

/// Where the rendering surface should scroll to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollTarget {
    /// Page number (1-indexed), `0` when there is nothing to scroll to.
    pub page: u32,
    /// Vertical pixel offset within the page.
    pub offset: f64,
    /// Request sequence number.
    pub sequence: u64,
}

impl ScrollTarget {
    /// Sentinel meaning "do not scroll".
    pub const NONE: Self = Self {
        page: 0,
        offset: 0.0,
        sequence: 0,
    };

    fn at(key: LabelKey, sequence: u64) -> Self {
        Self {
            page: key.page,
            offset: key.bbox.y0(),
            sequence,
        }
    }

    /// Returns true if this is the "do not scroll" sentinel.
    pub fn is_none(&self) -> bool {
        self.page == 0
    }
}

impl Default for ScrollTarget {
    fn default() -> Self {
        Self::NONE
    }
}

/// Resolves the scroll target for the active labels of a map.
///
/// Returns [`ScrollTarget::NONE`] when nothing is active.
pub fn resolve_scroll_target(
    labels: &LabelMap,
    anchor: ScrollAnchor,
    sequence: u64,
) -> ScrollTarget {
    let target = match anchor {
        ScrollAnchor::PartitionOrder => labels.first_active(),
        ScrollAnchor::ReadingOrder => labels.active().min_by(|a, b| reading_order(a, b)),
    };

    target.map_or(ScrollTarget::NONE, |label| ScrollTarget::at(label.key, sequence))
}

fn reading_order(a: &Label, b: &Label) -> std::cmp::Ordering {
    a.page()
        .cmp(&b.page())
        .then_with(|| a.bbox().y0().total_cmp(&b.bbox().y0()))
        .then_with(|| a.bbox().x0().total_cmp(&b.bbox().x0()))
}

/// Issues scroll requests with increasing sequence numbers.
#[derive(Debug, Clone, Default)]
pub struct PositionResolver {
    anchor: ScrollAnchor,
    sequence: u64,
    current: ScrollTarget,
}

impl PositionResolver {
    /// Creates a resolver with the given anchor policy.
    pub fn new(anchor: ScrollAnchor) -> Self {
        Self {
            anchor,
            ..Self::default()
        }
    }

    /// Returns the anchor policy.
    pub fn anchor(&self) -> ScrollAnchor {
        self.anchor
    }

    /// Returns the last issued target.
    pub fn current(&self) -> ScrollTarget {
        self.current
    }

    /// Issues a new scroll request for the map.
    ///
    /// The sequence number advances even when the coordinates are unchanged.
    pub fn request(&mut self, labels: &LabelMap) -> ScrollTarget {
        self.sequence += 1;
        self.current = resolve_scroll_target(labels, self.anchor, self.sequence);
        self.current
    }

    /// Issues the scroll request for a freshly built or restored map.
    ///
    /// Under the partition-order anchor the builder's first active label is
    /// the target; other anchors resolve against the map.
    pub fn start(&mut self, labels: &LabelMap, first_active: Option<LabelKey>) -> ScrollTarget {
        if self.anchor != ScrollAnchor::PartitionOrder {
            return self.request(labels);
        }

        self.sequence += 1;
        self.current = first_active.map_or(ScrollTarget::NONE, |key| {
            ScrollTarget::at(key, self.sequence)
        });
        self.current
    }

    /// Resets the current target to "do not scroll".
    ///
    /// The sequence keeps counting so later requests stay distinguishable.
    pub fn clear(&mut self) {
        self.current = ScrollTarget::NONE;
    }
}

/// Returns the page under the vertical midpoint of the viewport.
///
/// `offset` is the scroll offset of the surface, `page_height` the unscaled
/// height of one page. Returns `None` for a degenerate page extent.
pub fn visible_page(
    offset: f64,
    viewport_height: f64,
    page_height: f64,
    scale: f64,
) -> Option<u32> {
    let extent = page_height * scale;
    if !extent.is_finite()
        || extent <= 0.0
        || !offset.is_finite()
        || !viewport_height.is_finite()
    {
        return None;
    }

    let midpoint = (offset + viewport_height / 2.0).max(0.0);
    let page = (midpoint / extent).floor();
    if page >= f64::from(u32::MAX) {
        return Some(u32::MAX);
    }
    Some(page as u32 + 1)
}
