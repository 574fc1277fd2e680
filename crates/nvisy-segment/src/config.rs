//! Segment session configuration.

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::position::ScrollAnchor;

/// Default maximum number of cached per-chunk label maps (0 = unbounded).
pub const DEFAULT_MAX_CACHED_CHUNKS: usize = 0;

/// Configuration of a [`ReconcileSession`].
///
/// [`ReconcileSession`]: crate::ReconcileSession
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct SegmentConfig {
    /// Which active label a chunk selection scrolls to.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "scroll-anchor",
            env = "SEGMENT_SCROLL_ANCHOR",
            value_enum,
            default_value_t = ScrollAnchor::PartitionOrder
        )
    )]
    #[serde(default)]
    pub scroll_anchor: ScrollAnchor,

    /// Maximum number of overridden chunks whose label maps are kept (0 = unbounded).
    #[cfg_attr(
        feature = "config",
        arg(
            long = "max-cached-chunks",
            env = "SEGMENT_MAX_CACHED_CHUNKS",
            default_value_t = DEFAULT_MAX_CACHED_CHUNKS
        )
    )]
    #[serde(default)]
    pub max_cached_chunks: usize,
}

impl SegmentConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scroll anchor policy.
    pub fn with_scroll_anchor(mut self, scroll_anchor: ScrollAnchor) -> Self {
        self.scroll_anchor = scroll_anchor;
        self
    }

    /// Sets the cache bound.
    pub fn with_max_cached_chunks(mut self, max_cached_chunks: usize) -> Self {
        self.max_cached_chunks = max_cached_chunks;
        self
    }

    /// Returns the cache bound, `None` if unbounded.
    #[inline]
    pub fn cache_limit(&self) -> Option<usize> {
        if self.max_cached_chunks == 0 {
            None
        } else {
            Some(self.max_cached_chunks)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SegmentConfig::default();
        assert_eq!(config.scroll_anchor, ScrollAnchor::PartitionOrder);
        assert_eq!(config.cache_limit(), None);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: SegmentConfig =
            serde_json::from_str(r#"{"scroll_anchor": "reading_order"}"#).unwrap();
        assert_eq!(config.scroll_anchor, ScrollAnchor::ReadingOrder);
        assert_eq!(config.with_max_cached_chunks(8).cache_limit(), Some(8));
    }
}
