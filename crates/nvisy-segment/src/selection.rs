//! Active-set synchronization.
//!
//! The rendering surface reports label toggles one label at a time, but a
//! label may be only one wrapped line of a longer run. Activation is therefore
//! applied to the whole `part_id` group so a run is never partially selected.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkBbox, ChunkBboxes};
use crate::geometry::LabelKey;
use crate::label::LabelMap;
use crate::{Result, TRACING_TARGET_SELECTION};

/// A toggle reported by the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelToggle {
    /// Toggled label.
    #[serde(rename = "id")]
    pub key: LabelKey,
    /// Requested state.
    pub active: bool,
}

impl LabelToggle {
    /// Creates a new toggle.
    pub fn new(key: LabelKey, active: bool) -> Self {
        Self { key, active }
    }

    /// Creates a toggle from the surface's textual label id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is not of the form `page-x0-y0-x1-y1`.
    pub fn parse(id: &str, active: bool) -> Result<Self> {
        Ok(Self::new(id.parse()?, active))
    }
}

/// The regions the user currently wants the selected chunk to cover.
///
/// Always the complete list of active labels, never a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActiveSelection(Vec<ChunkBbox>);

impl ActiveSelection {
    /// Returns the selected regions.
    pub fn as_slice(&self) -> &[ChunkBbox] {
        &self.0
    }

    /// Returns the selected label keys.
    pub fn keys(&self) -> HashSet<LabelKey> {
        self.0.iter().map(ChunkBbox::key).collect()
    }

    /// Returns the wire form of the selection.
    pub fn to_bboxes(&self) -> ChunkBboxes {
        ChunkBboxes::new(self.0.clone())
    }

    /// Returns the number of selected regions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ChunkBbox> for ActiveSelection {
    fn from_iter<T: IntoIterator<Item = ChunkBbox>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Applies a batch of toggles to the label map.
///
/// Each toggle flips the whole run group of its label. When several toggles
/// of one batch land in the same group, the first one wins. Toggles for
/// unknown labels are ignored. Returns the resulting selection.
pub fn toggle_labels(labels: &mut LabelMap, toggles: &[LabelToggle]) -> ActiveSelection {
    let mut seen_groups = HashSet::new();

    for toggle in toggles {
        let Some(label) = labels.get(&toggle.key) else {
            tracing::debug!(
                target: TRACING_TARGET_SELECTION,
                label = %toggle.key,
                "Ignoring toggle for unknown label"
            );
            continue;
        };

        let part_id = label.part_id.clone();
        if !seen_groups.insert(part_id.clone()) {
            tracing::trace!(
                target: TRACING_TARGET_SELECTION,
                label = %toggle.key,
                part_id = %part_id,
                "Group already toggled in this batch"
            );
            continue;
        }

        let affected = labels.set_group_active(&part_id, toggle.active);
        tracing::debug!(
            target: TRACING_TARGET_SELECTION,
            label = %toggle.key,
            part_id = %part_id,
            active = toggle.active,
            affected,
            "Toggled label group"
        );
    }

    labels.selection()
}
