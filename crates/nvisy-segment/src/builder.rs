//! Label map construction.

use std::collections::HashSet;

use crate::chunk::Chunk;
use crate::geometry::LabelKey;
use crate::label::{Label, LabelMap};
use crate::partition::PartitionStore;
use crate::TRACING_TARGET_BUILDER;

/// Output of [`build_label_map`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelBuild {
    /// Labels of the document, active where they belong to the chunk.
    pub labels: LabelMap,
    /// First active label in partition order, the initial scroll target.
    pub first_active: Option<LabelKey>,
}

impl LabelBuild {
    /// Returns true if nothing was built.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl From<LabelMap> for LabelBuild {
    /// Wraps a previously built map, such as a cached one.
    fn from(labels: LabelMap) -> Self {
        let first_active = labels.first_active().map(|label| label.key);
        Self {
            labels,
            first_active,
        }
    }
}

/// Builds the label map of a document for the selected chunk.
///
/// Returns an empty build when no chunk is selected or the document has no
/// spatial layout. A chunk whose stored bbox is missing or malformed yields
/// labels with nothing active. Label identity depends only on page and
/// bounding box, so the same inputs always produce the same map.
pub fn build_label_map(
    partitions: &PartitionStore,
    selected_chunk: Option<&Chunk>,
) -> LabelBuild {
    let Some(chunk) = selected_chunk else {
        return LabelBuild::default();
    };

    if partitions.is_empty() {
        tracing::debug!(
            target: TRACING_TARGET_BUILDER,
            chunk_index = chunk.chunk_index,
            "Document has no spatial layout"
        );
        return LabelBuild::default();
    }

    let candidates: HashSet<LabelKey> = chunk.bboxes().keys().collect();
    let mut labels = LabelMap::new();
    let mut first_active = None;

    for part in partitions {
        let active = candidates.contains(&part.key);
        if labels.insert(Label::new(part.key, part.group.as_str(), active))
            && active
            && first_active.is_none()
        {
            first_active = Some(part.key);
        }
    }

    let unmatched = candidates.iter().filter(|key| !labels.contains(key)).count();
    tracing::debug!(
        target: TRACING_TARGET_BUILDER,
        chunk_index = chunk.chunk_index,
        labels = labels.len(),
        active = labels.active().count(),
        unmatched,
        "Built label map"
    );

    LabelBuild {
        labels,
        first_active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARTITIONS: &str = r#"{
        "1-0-0-100-10": {"text": "Heading", "type": "Title", "part_id": "t"},
        "1-0-20-100-30": {"text": "Line one", "type": "Paragraph", "part_id": "p"},
        "1-0-30-100-40": {"text": " continues", "type": "Paragraph", "part_id": "p"},
        "2-0-0-100-10": {"text": "Next page", "type": "Paragraph", "part_id": "q"}
    }"#;

    fn store() -> PartitionStore {
        PartitionStore::from_json(PARTITIONS).unwrap()
    }

    fn chunk(bbox: &str) -> Chunk {
        Chunk::new(0, "text").with_bbox(bbox)
    }

    #[test]
    fn test_marks_chunk_regions_active() {
        let chunk = chunk(
            r#"{"chunk_bboxes":[
                {"page":2,"bbox":[0,0,100,10]},
                {"page":1,"bbox":[0,20,100,30]}
            ]}"#,
        );
        let build = build_label_map(&store(), Some(&chunk));

        assert_eq!(build.labels.len(), 4);
        assert_eq!(build.labels.active().count(), 2);
        // Partition order decides, not bbox order.
        assert_eq!(build.first_active, Some("1-0-20-100-30".parse().unwrap()));
    }

    #[test]
    fn test_no_selection_builds_nothing() {
        assert!(build_label_map(&store(), None).is_empty());
    }

    #[test]
    fn test_no_layout_builds_nothing() {
        let chunk = chunk(r#"{"chunk_bboxes":[{"page":1,"bbox":[0,0,100,10]}]}"#);
        assert!(build_label_map(&PartitionStore::default(), Some(&chunk)).is_empty());
    }

    #[test]
    fn test_malformed_bbox_has_no_active_labels() {
        let build = build_label_map(&store(), Some(&chunk("{bad json")));
        assert_eq!(build.labels.len(), 4);
        assert!(!build.labels.has_active());
        assert!(build.first_active.is_none());
    }

    #[test]
    fn test_from_map_finds_first_active() {
        let chunk = chunk(r#"{"chunk_bboxes":[{"page":2,"bbox":[0,0,100,10]}]}"#);
        let build = build_label_map(&store(), Some(&chunk));
        assert_eq!(LabelBuild::from(build.labels.clone()), build);
    }

    #[test]
    fn test_build_is_deterministic() {
        let chunk = chunk(r#"{"chunk_bboxes":[{"page":1,"bbox":[0.0,30.0,100.0,40.0]}]}"#);
        let first = build_label_map(&store(), Some(&chunk));
        let second = build_label_map(&store(), Some(&chunk));

        assert_eq!(first, second);
        assert_eq!(first.labels.active_keys(), second.labels.active_keys());
    }
}
