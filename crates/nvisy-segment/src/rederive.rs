//! Chunk text re-derivation ("override").
//!
//! Rebuilds a chunk's text from the parts behind its active labels. Parts are
//! visited in partition order, never in label map order, and joined by their
//! layout type:
//!
//! - parts of the same run (`part_id`) are concatenated as-is,
//! - a table on either side, or a title following a non-title, is set off by
//!   a blank line,
//! - anything else is separated by a single newline.
//!
//! A title that opens the text is followed by a newline. That newline doubles
//! as the separator to whatever follows, so `Title` + `Body` reads
//! `"Title\nBody"` rather than leaving an empty line behind the title.

use crate::label::LabelMap;
use crate::partition::{Part, PartType, PartitionStore};
use crate::{Result, SegmentError, TRACING_TARGET_OVERRIDE};

/// Re-derives the chunk text from the active labels.
///
/// The result depends only on the partition order and the active set, so
/// re-running it on the same state always yields the same text. It may be
/// empty; callers reject empty results before writing them back.
///
/// # Errors
///
/// Returns [`SegmentError::StalePartitionReference`] if any label of the map
/// no longer resolves to a part.
pub fn override_chunk_text(labels: &LabelMap, partitions: &PartitionStore) -> Result<String> {
    if let Some(key) = labels.keys().find(|key| !partitions.contains(key)) {
        tracing::warn!(
            target: TRACING_TARGET_OVERRIDE,
            label = %key,
            "Label does not resolve to a part"
        );
        return Err(SegmentError::StalePartitionReference { key: *key });
    }

    let mut text = String::new();
    let mut previous: Option<&Part> = None;
    let mut pending_newline = false;
    let mut emitted = 0usize;

    let active_parts = partitions
        .iter()
        .filter(|part| labels.get(&part.key).is_some_and(|label| label.active));

    for part in active_parts {
        match previous {
            None => {
                text.push_str(&part.text);
                pending_newline = part.part_type == PartType::Title;
            }
            Some(prev) => {
                let separator = separator(prev, part);
                if !separator.is_empty() {
                    // A pending title newline is absorbed by the separator.
                    text.push_str(separator);
                    pending_newline = false;
                }
                text.push_str(&part.text);
            }
        }

        previous = Some(part);
        emitted += 1;
    }

    if pending_newline {
        text.push('\n');
    }

    tracing::debug!(
        target: TRACING_TARGET_OVERRIDE,
        parts = emitted,
        characters = text.chars().count(),
        "Re-derived chunk text"
    );

    Ok(text)
}

fn separator(prev: &Part, part: &Part) -> &'static str {
    if part.part_id == prev.part_id {
        ""
    } else if prev.part_type == PartType::Table
        || part.part_type == PartType::Table
        || (part.part_type == PartType::Title && part.part_type != prev.part_type)
    {
        "\n\n"
    } else {
        "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_label_map;
    use crate::chunk::Chunk;
    use crate::label::Label;
    use crate::selection::{LabelToggle, toggle_labels};

    /// Builds a store and a map with every part active.
    fn all_active(json: &str) -> (PartitionStore, LabelMap) {
        let store = PartitionStore::from_json(json).unwrap();
        let labels = store
            .iter()
            .map(|part| Label::new(part.key, part.part_id.as_str(), true))
            .collect();
        (store, labels)
    }

    #[test]
    fn test_same_run_is_concatenated() {
        let (store, labels) = all_active(
            r#"{
                "1-0-0-100-10": {"text": "Hello", "type": "Paragraph", "part_id": "a"},
                "1-0-10-100-20": {"text": " world", "type": "Paragraph", "part_id": "a"}
            }"#,
        );
        assert_eq!(override_chunk_text(&labels, &store).unwrap(), "Hello world");
    }

    #[test]
    fn test_title_then_body() {
        let (store, labels) = all_active(
            r#"{
                "1-0-0-100-10": {"text": "Title", "type": "Title", "part_id": "a"},
                "1-0-10-100-20": {"text": "Body", "type": "Paragraph", "part_id": "b"}
            }"#,
        );
        assert_eq!(override_chunk_text(&labels, &store).unwrap(), "Title\nBody");
    }

    #[test]
    fn test_table_boundary_is_blank_line() {
        let (store, labels) = all_active(
            r#"{
                "1-0-0-100-10": {"text": "Row1", "type": "Table", "part_id": "a"},
                "1-0-10-100-20": {"text": "Next", "type": "Paragraph", "part_id": "b"}
            }"#,
        );
        assert_eq!(override_chunk_text(&labels, &store).unwrap(), "Row1\n\nNext");
    }

    #[test]
    fn test_title_after_paragraph_is_blank_line() {
        let (store, labels) = all_active(
            r#"{
                "1-0-0-100-10": {"text": "Intro", "type": "Paragraph", "part_id": "a"},
                "1-0-10-100-20": {"text": "Section", "type": "Title", "part_id": "b"},
                "1-0-20-100-30": {"text": "Sub", "type": "Title", "part_id": "c"},
                "1-0-30-100-40": {"text": "Text", "type": "ListItem", "part_id": "d"}
            }"#,
        );
        assert_eq!(
            override_chunk_text(&labels, &store).unwrap(),
            "Intro\n\nSection\nSub\nText"
        );
    }

    #[test]
    fn test_lone_title_keeps_trailing_newline() {
        let (store, labels) =
            all_active(r#"{"1-0-0-100-10": {"text": "Title", "type": "Title", "part_id": "a"}}"#);
        assert_eq!(override_chunk_text(&labels, &store).unwrap(), "Title\n");
    }

    #[test]
    fn test_wrapped_title_newline_follows_the_run() {
        let (store, labels) = all_active(
            r#"{
                "1-0-0-100-10": {"text": "Long", "type": "Title", "part_id": "a"},
                "1-0-10-100-20": {"text": " title", "type": "Title", "part_id": "a"},
                "1-0-20-100-30": {"text": "Body", "type": "Paragraph", "part_id": "b"}
            }"#,
        );
        assert_eq!(override_chunk_text(&labels, &store).unwrap(), "Long title\nBody");
    }

    #[test]
    fn test_follows_partition_order_and_skips_inactive() {
        let store = PartitionStore::from_json(
            r#"{
                "1-0-0-100-10": {"text": "first", "type": "Paragraph", "part_id": "a"},
                "1-0-10-100-20": {"text": "skipped", "type": "Paragraph", "part_id": "b"},
                "1-0-20-100-30": {"text": "third", "type": "Paragraph", "part_id": "c"}
            }"#,
        )
        .unwrap();

        // Insert in reverse order to make sure map order is not used.
        let labels: LabelMap = store
            .iter()
            .rev()
            .map(|part| Label::new(part.key, part.part_id.as_str(), part.part_id != "b"))
            .collect();

        assert_eq!(override_chunk_text(&labels, &store).unwrap(), "first\nthird");
    }

    #[test]
    fn test_shared_box_keeps_runs_whole() {
        let store = PartitionStore::from_json(
            r#"{
                "1-0-0-10-10": {"text": "A", "type": "Paragraph", "part_id": "a"},
                "1-0-0-10-10.0": {"text": "B1", "type": "Paragraph", "part_id": "b"},
                "1-0-10-10-20": {"text": "B2", "type": "Paragraph", "part_id": "b"}
            }"#,
        )
        .unwrap();

        for id in ["1-0-10-10-20", "1-0-0-10-10"] {
            let mut labels = build_label_map(&store, Some(&Chunk::new(0, ""))).labels;
            toggle_labels(&mut labels, &[LabelToggle::parse(id, true).unwrap()]);
            assert_eq!(override_chunk_text(&labels, &store).unwrap(), "A\nB1B2");
        }
    }

    #[test]
    fn test_stale_label_fails() {
        let (store, mut labels) = all_active(
            r#"{"1-0-0-100-10": {"text": "Hello", "type": "Paragraph", "part_id": "a"}}"#,
        );
        labels.insert(Label::new("4-0-0-1-1".parse().unwrap(), "gone", true));

        let error = override_chunk_text(&labels, &store).unwrap_err();
        assert!(matches!(error, SegmentError::StalePartitionReference { .. }));
    }

    #[test]
    fn test_nothing_active_is_empty() {
        let store = PartitionStore::from_json(
            r#"{"1-0-0-100-10": {"text": "Hello", "type": "Paragraph", "part_id": "a"}}"#,
        )
        .unwrap();
        let labels = build_label_map(&store, Some(&Chunk::new(0, "Hello"))).labels;
        assert_eq!(override_chunk_text(&labels, &store).unwrap(), "");
    }
}
