//! Labels and label maps.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::chunk::ChunkBbox;
use crate::geometry::{BoundingBox, LabelKey};
use crate::selection::ActiveSelection;

/// Highlightable region of a page derived from a part.
///
/// Serializes as `{id, page, bbox, part_id, active}` so a renderer can draw
/// the region without parsing the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "LabelRecord", from = "LabelRecord")]
pub struct Label {
    /// Geometric identity, rendered as `page-x0-y0-x1-y1`.
    pub key: LabelKey,
    /// Activation group: the part's run, merged with any run sharing a box.
    pub part_id: String,
    /// Whether the label belongs to the selected chunk.
    pub active: bool,
}

impl Label {
    /// Creates a new label.
    pub fn new(key: LabelKey, part_id: impl Into<String>, active: bool) -> Self {
        Self {
            key,
            part_id: part_id.into(),
            active,
        }
    }

    /// Page the label sits on.
    #[inline]
    pub fn page(&self) -> u32 {
        self.key.page
    }

    /// Pixel bounding box of the label.
    #[inline]
    pub fn bbox(&self) -> BoundingBox {
        self.key.bbox
    }
}

/// Wire form of a [`Label`].
///
/// `page` and `bbox` are derived from `id` and ignored when reading.
#[derive(Serialize, Deserialize)]
struct LabelRecord {
    id: LabelKey,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    bbox: Option<BoundingBox>,
    part_id: String,
    active: bool,
}

impl From<Label> for LabelRecord {
    fn from(label: Label) -> Self {
        Self {
            id: label.key,
            page: Some(label.key.page),
            bbox: Some(label.key.bbox),
            part_id: label.part_id,
            active: label.active,
        }
    }
}

impl From<LabelRecord> for Label {
    fn from(record: LabelRecord) -> Self {
        Self::new(record.id, record.part_id, record.active)
    }
}

/// Labels of one document keyed by geometry, in canonical partition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap {
    labels: IndexMap<LabelKey, Label>,
}

impl LabelMap {
    /// Creates an empty label map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a label unless one with the same key exists.
    ///
    /// Returns false if the key was already present; the earlier label wins.
    pub fn insert(&mut self, label: Label) -> bool {
        match self.labels.entry(label.key) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(label);
                true
            }
        }
    }

    /// Returns the label with the given key.
    pub fn get(&self, key: &LabelKey) -> Option<&Label> {
        self.labels.get(key)
    }

    /// Returns true if the map contains the key.
    pub fn contains(&self, key: &LabelKey) -> bool {
        self.labels.contains_key(key)
    }

    /// Returns all labels in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.values()
    }

    /// Returns all keys in canonical order.
    pub fn keys(&self) -> impl Iterator<Item = &LabelKey> {
        self.labels.keys()
    }

    /// Returns the active labels in canonical order.
    pub fn active(&self) -> impl Iterator<Item = &Label> {
        self.labels.values().filter(|label| label.active)
    }

    /// Returns the first active label in canonical order.
    pub fn first_active(&self) -> Option<&Label> {
        self.active().next()
    }

    /// Returns the set of active keys.
    pub fn active_keys(&self) -> HashSet<LabelKey> {
        self.active().map(|label| label.key).collect()
    }

    /// Returns true if any label is active.
    pub fn has_active(&self) -> bool {
        self.first_active().is_some()
    }

    /// Sets every label of a run group to the given state.
    ///
    /// Returns the number of labels in the group.
    pub fn set_group_active(&mut self, part_id: &str, active: bool) -> usize {
        let mut count = 0;
        for label in self.labels.values_mut() {
            if label.part_id == part_id {
                label.active = active;
                count += 1;
            }
        }
        count
    }

    /// Returns the current selection built from the active labels.
    pub fn selection(&self) -> ActiveSelection {
        self.active()
            .map(|label| ChunkBbox::from(label.key))
            .collect()
    }

    /// Groups all labels by page for rendering.
    pub fn labels_by_page(&self) -> BTreeMap<u32, Vec<Label>> {
        group_by_page(self.iter())
    }

    /// Groups the active labels by page for highlighting.
    pub fn active_labels_by_page(&self) -> BTreeMap<u32, Vec<Label>> {
        group_by_page(self.active())
    }

    /// Returns the number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if the map has no labels.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn group_by_page<'a>(labels: impl Iterator<Item = &'a Label>) -> BTreeMap<u32, Vec<Label>> {
    let mut pages: BTreeMap<u32, Vec<Label>> = BTreeMap::new();
    for label in labels {
        pages.entry(label.page()).or_default().push(label.clone());
    }
    pages
}

impl FromIterator<Label> for LabelMap {
    fn from_iter<T: IntoIterator<Item = Label>>(iter: T) -> Self {
        let mut map = Self::new();
        for label in iter {
            map.insert(label);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(id: &str, part_id: &str, active: bool) -> Label {
        Label::new(id.parse().unwrap(), part_id, active)
    }

    #[test]
    fn test_first_insert_wins() {
        let mut map = LabelMap::new();
        assert!(map.insert(label("1-0-0-1-1", "a", true)));
        assert!(!map.insert(label("1-0.0-0-1-1", "b", false)));

        assert_eq!(map.len(), 1);
        assert_eq!(map.iter().next().unwrap().part_id, "a");
    }

    #[test]
    fn test_set_group_active() {
        let mut map: LabelMap = [
            label("1-0-0-1-1", "a", false),
            label("1-0-2-1-3", "a", false),
            label("1-0-4-1-5", "b", false),
        ]
        .into_iter()
        .collect();

        assert_eq!(map.set_group_active("a", true), 2);
        assert_eq!(map.active().count(), 2);
        assert_eq!(map.set_group_active("missing", true), 0);
    }

    #[test]
    fn test_active_labels_by_page() {
        let map: LabelMap = [
            label("2-0-0-1-1", "a", true),
            label("1-0-0-1-1", "b", true),
            label("1-0-2-1-3", "c", false),
        ]
        .into_iter()
        .collect();

        let pages = map.active_labels_by_page();
        assert_eq!(pages.keys().copied().collect::<Vec<_>>(), [1, 2]);
        assert_eq!(pages[&1].len(), 1);
        assert_eq!(map.labels_by_page()[&1].len(), 2);
    }

    #[test]
    fn test_label_serializes_with_string_id() {
        let json = serde_json::to_value(label("1-10-20-30-40.5", "a", true)).unwrap();
        assert_eq!(json["id"], "1-10-20-30-40.5");
        assert_eq!(json["page"], 1);
        assert_eq!(json["bbox"], serde_json::json!([10.0, 20.0, 30.0, 40.5]));
        assert_eq!(json["part_id"], "a");
        assert_eq!(json["active"], true);
    }

    #[test]
    fn test_label_reads_back_from_id() {
        let label: Label = serde_json::from_str(
            r#"{"id": "2-0-0-5-5", "page": 9, "bbox": [1, 1, 1, 1], "part_id": "a", "active": false}"#,
        )
        .unwrap();
        assert_eq!(label.page(), 2);
        assert_eq!(label.bbox().as_array(), [0.0, 0.0, 5.0, 5.0]);
    }
}
