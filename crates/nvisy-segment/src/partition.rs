//! Partition store.
//!
//! The layout producer delivers one JSON object per document, keyed by an
//! opaque part id that encodes `page-x0-y0-x1-y1`. The object's key order is
//! the order in which the parser emitted the parts and is treated as the
//! canonical order for every downstream computation, so the payload is read
//! into an [`IndexMap`] rather than a sorted map.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::geometry::LabelKey;
use crate::{Result, TRACING_TARGET_BUILDER};

/// Raw partition payload as delivered by the layout producer.
pub type PartitionPayload = IndexMap<String, RawPart>;

/// Layout type of a part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[strum(ascii_case_insensitive)]
pub enum PartType {
    /// Section or document title.
    Title,
    /// Body text.
    #[strum(serialize = "Paragraph", serialize = "NarrativeText", serialize = "Text")]
    Paragraph,
    /// Item of a bulleted or numbered list.
    ListItem,
    /// Table cell or row.
    Table,
    /// Running page header.
    Header,
    /// Running page footer.
    Footer,
    /// Figure or table caption.
    #[strum(serialize = "Caption", serialize = "FigureCaption")]
    Caption,
    /// Embedded picture.
    Image,
    /// Mathematical formula.
    Formula,
    /// Any type this crate does not know about.
    #[strum(default)]
    Other(String),
}

impl PartType {
    /// Returns the canonical name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Title => "Title",
            Self::Paragraph => "Paragraph",
            Self::ListItem => "ListItem",
            Self::Table => "Table",
            Self::Header => "Header",
            Self::Footer => "Footer",
            Self::Caption => "Caption",
            Self::Image => "Image",
            Self::Formula => "Formula",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for PartType {
    fn from(value: String) -> Self {
        // The `Other` fallback makes parsing infallible.
        value.parse().unwrap_or(Self::Other(value))
    }
}

impl From<PartType> for String {
    fn from(value: PartType) -> Self {
        value.as_str().to_owned()
    }
}

/// A part as it appears in the raw payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPart {
    /// Extracted text of the part.
    #[serde(default)]
    pub text: String,

    /// Layout type.
    #[serde(rename = "type")]
    pub part_type: PartType,

    /// Group of parts forming one contiguous run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
}

/// A normalized part with its derived label identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    /// Opaque id from the payload.
    pub id: String,
    /// Geometric identity derived from the id.
    pub key: LabelKey,
    /// Extracted text.
    pub text: String,
    /// Layout type.
    pub part_type: PartType,
    /// Run group; falls back to the part id when the payload has none.
    pub part_id: String,
    /// Activation group: the run, merged with every run sharing a box with it.
    pub group: String,
}

/// Ordered, immutable collection of the parts of one document.
#[derive(Debug, Clone, Default)]
pub struct PartitionStore {
    parts: Vec<Part>,
    by_key: HashMap<LabelKey, usize>,
}

impl PartitionStore {
    /// Normalizes a raw payload, keeping its key order.
    ///
    /// Parts whose id does not encode a page and bounding box cannot be
    /// located on the page and are skipped.
    pub fn from_payload(payload: PartitionPayload) -> Self {
        let mut parts = Vec::with_capacity(payload.len());
        let mut by_key = HashMap::with_capacity(payload.len());
        let mut skipped = 0usize;

        for (id, raw) in payload {
            let key = match id.parse::<LabelKey>() {
                Ok(key) => key,
                Err(error) => {
                    tracing::debug!(
                        target: TRACING_TARGET_BUILDER,
                        part = %id,
                        error = %error,
                        "Skipping part without geometry"
                    );
                    skipped += 1;
                    continue;
                }
            };

            // Parts sharing a box share a label; lookups resolve to the first.
            by_key.entry(key).or_insert(parts.len());
            let part_id = raw.part_id.unwrap_or_else(|| id.clone());
            parts.push(Part {
                group: part_id.clone(),
                part_id,
                id,
                key,
                text: raw.text,
                part_type: raw.part_type,
            });
        }

        let groups = merge_shared_boxes(&parts);
        if !groups.is_empty() {
            tracing::debug!(
                target: TRACING_TARGET_BUILDER,
                merged = groups.len(),
                "Merged runs sharing a box"
            );
            for part in &mut parts {
                if let Some(group) = groups.get(&part.part_id) {
                    part.group.clone_from(group);
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(
                target: TRACING_TARGET_BUILDER,
                skipped,
                kept = parts.len(),
                "Partition payload contained parts without geometry"
            );
        }

        Self { parts, by_key }
    }

    /// Parses and normalizes a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a partition object.
    pub fn from_json(json: &str) -> Result<Self> {
        let payload: PartitionPayload = serde_json::from_str(json)?;
        Ok(Self::from_payload(payload))
    }

    /// Returns the parts in canonical order.
    pub fn iter(&self) -> std::slice::Iter<'_, Part> {
        self.parts.iter()
    }

    /// Returns the first part occupying the given box.
    pub fn get(&self, key: &LabelKey) -> Option<&Part> {
        self.by_key.get(key).map(|&index| &self.parts[index])
    }

    /// Returns true if a part occupies the given box.
    pub fn contains(&self, key: &LabelKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Returns the number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns true if the document has no spatial layout.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Merges runs whose parts share a box, so one label never spans two groups.
///
/// Returns the group of every merged run, named after the run that appears
/// first in partition order.
fn merge_shared_boxes(parts: &[Part]) -> HashMap<String, String> {
    let mut run_start: HashMap<&str, usize> = HashMap::new();
    for (index, part) in parts.iter().enumerate() {
        run_start.entry(part.part_id.as_str()).or_insert(index);
    }

    let mut owner: HashMap<LabelKey, &str> = HashMap::new();
    let mut parent: HashMap<&str, &str> = HashMap::new();

    for part in parts {
        let first = match owner.get(&part.key).copied() {
            Some(first) => first,
            None => {
                owner.insert(part.key, part.part_id.as_str());
                continue;
            }
        };

        let a = root(&parent, first);
        let b = root(&parent, part.part_id.as_str());
        if a != b {
            let (keep, merge) = if run_start[a] <= run_start[b] { (a, b) } else { (b, a) };
            parent.insert(merge, keep);
        }
    }

    parent
        .keys()
        .map(|run| ((*run).to_owned(), root(&parent, run).to_owned()))
        .collect()
}

fn root<'a>(parent: &HashMap<&'a str, &'a str>, mut run: &'a str) -> &'a str {
    while let Some(&next) = parent.get(run) {
        run = next;
    }
    run
}

impl<'a> IntoIterator for &'a PartitionStore {
    type IntoIter = std::slice::Iter<'a, Part>;
    type Item = &'a Part;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_payload_order() {
        let store = PartitionStore::from_json(
            r#"{
                "2-0-0-10-10": {"text": "b", "type": "Paragraph", "part_id": "x"},
                "1-0-0-10-10": {"text": "a", "type": "Paragraph", "part_id": "y"}
            }"#,
        )
        .unwrap();

        let texts: Vec<_> = store.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, ["b", "a"]);
    }

    #[test]
    fn test_skips_parts_without_geometry() {
        let store = PartitionStore::from_json(
            r#"{
                "p1": {"text": "lost", "type": "Paragraph", "part_id": "a"},
                "1-0-0-10-10": {"text": "kept", "type": "Paragraph", "part_id": "a"}
            }"#,
        )
        .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.iter().next().unwrap().text, "kept");
    }

    #[test]
    fn test_part_id_defaults_to_id() {
        let store =
            PartitionStore::from_json(r#"{"1-0-0-1-1": {"text": "t", "type": "Title"}}"#).unwrap();
        assert_eq!(store.iter().next().unwrap().part_id, "1-0-0-1-1");
    }

    #[test]
    fn test_part_type_parsing() {
        assert_eq!(PartType::from("Title".to_owned()), PartType::Title);
        assert_eq!(PartType::from("table".to_owned()), PartType::Table);
        assert_eq!(PartType::from("NarrativeText".to_owned()), PartType::Paragraph);
        assert_eq!(
            PartType::from("PageBreak".to_owned()),
            PartType::Other("PageBreak".to_owned())
        );
        assert_eq!(String::from(PartType::Other("PageBreak".to_owned())), "PageBreak");
    }

    #[test]
    fn test_same_box_resolves_to_first_part() {
        let store = PartitionStore::from_json(
            r#"{
                "1-0-0-10-10": {"text": "first", "type": "Paragraph", "part_id": "a"},
                "1-0.0-0-10.0-10": {"text": "second", "type": "Paragraph", "part_id": "b"}
            }"#,
        )
        .unwrap();

        assert_eq!(store.len(), 2);
        let key: LabelKey = "1-0-0-10-10".parse().unwrap();
        assert_eq!(store.get(&key).unwrap().text, "first");
    }

    #[test]
    fn test_runs_sharing_a_box_are_merged() {
        let store = PartitionStore::from_json(
            r#"{
                "1-0-0-10-10": {"text": "A", "type": "Paragraph", "part_id": "a"},
                "1-0-20-10-30": {"text": "C", "type": "Paragraph", "part_id": "c"},
                "1-0-0-10-10.0": {"text": "B1", "type": "Paragraph", "part_id": "b"},
                "1-0-10-10-20": {"text": "B2", "type": "Paragraph", "part_id": "b"}
            }"#,
        )
        .unwrap();

        let groups: Vec<_> = store
            .iter()
            .map(|p| (p.part_id.as_str(), p.group.as_str()))
            .collect();
        assert_eq!(groups, [("a", "a"), ("c", "c"), ("b", "a"), ("b", "a")]);
    }

    #[test]
    fn test_empty_payload_has_no_layout() {
        let store = PartitionStore::from_json("{}").unwrap();
        assert!(store.is_empty());
    }
}
