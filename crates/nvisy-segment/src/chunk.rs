//! Chunks and their stored bounding boxes.

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, LabelKey};
use crate::{Result, SegmentError, TRACING_TARGET_BUILDER};

/// A retrieval chunk of the loaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Index of the chunk within the loaded document.
    #[serde(alias = "chunkIndex")]
    pub chunk_index: u32,

    /// Chunk text.
    #[serde(default)]
    pub text: String,

    /// Serialized [`ChunkBboxes`], if the chunk has a spatial extent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<String>,
}

impl Chunk {
    /// Creates a chunk without a stored spatial extent.
    pub fn new(chunk_index: u32, text: impl Into<String>) -> Self {
        Self {
            chunk_index,
            text: text.into(),
            bbox: None,
        }
    }

    /// Sets the serialized bbox string.
    pub fn with_bbox(mut self, bbox: impl Into<String>) -> Self {
        self.bbox = Some(bbox.into());
        self
    }

    /// Returns the stored bounding boxes.
    ///
    /// A missing or malformed bbox string degrades to an empty list: the
    /// chunk's text stays valid even when nothing can be highlighted.
    pub fn bboxes(&self) -> ChunkBboxes {
        let Some(raw) = self.bbox.as_deref() else {
            return ChunkBboxes::default();
        };

        ChunkBboxes::from_json(raw).unwrap_or_else(|error| {
            tracing::warn!(
                target: TRACING_TARGET_BUILDER,
                chunk_index = self.chunk_index,
                error = %error,
                "Ignoring malformed chunk bbox"
            );
            ChunkBboxes::default()
        })
    }
}

/// One stored region of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkBbox {
    /// Page number (1-indexed).
    pub page: u32,
    /// Pixel bounding box.
    pub bbox: BoundingBox,
}

impl ChunkBbox {
    /// Returns the label key of this region.
    pub fn key(&self) -> LabelKey {
        LabelKey::new(self.page, self.bbox)
    }
}

impl From<LabelKey> for ChunkBbox {
    fn from(key: LabelKey) -> Self {
        Self {
            page: key.page,
            bbox: key.bbox,
        }
    }
}

/// Wire form of a chunk's spatial extent:
/// `{"chunk_bboxes":[{"page":1,"bbox":[x0,y0,x1,y1]}]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkBboxes {
    /// Regions of the chunk.
    #[serde(default)]
    pub chunk_bboxes: Vec<ChunkBbox>,
}

impl ChunkBboxes {
    /// Creates the wire form from a list of regions.
    pub fn new(chunk_bboxes: Vec<ChunkBbox>) -> Self {
        Self { chunk_bboxes }
    }

    /// Parses the wire form.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::MalformedBboxJson`] if the string is not valid.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(SegmentError::MalformedBboxJson)
    }

    /// Serializes to the wire form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns the label keys of all regions.
    pub fn keys(&self) -> impl Iterator<Item = LabelKey> + '_ {
        self.chunk_bboxes.iter().map(ChunkBbox::key)
    }

    /// Returns true if there are no regions.
    pub fn is_empty(&self) -> bool {
        self.chunk_bboxes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let bboxes = ChunkBboxes::new(vec![ChunkBbox {
            page: 1,
            bbox: BoundingBox::new(0.0, 10.0, 100.5, 20.0).unwrap(),
        }]);

        assert_eq!(
            bboxes.to_json().unwrap(),
            r#"{"chunk_bboxes":[{"page":1,"bbox":[0.0,10.0,100.5,20.0]}]}"#
        );
    }

    #[test]
    fn test_parses_integer_coordinates() {
        let bboxes =
            ChunkBboxes::from_json(r#"{"chunk_bboxes":[{"page":2,"bbox":[1,2,3,4]}]}"#).unwrap();
        let key = bboxes.keys().next().unwrap();
        assert_eq!(key, "2-1-2-3-4".parse().unwrap());
    }

    #[test]
    fn test_malformed_bbox_degrades_to_empty() {
        let chunk = Chunk::new(0, "text").with_bbox("{bad json");
        assert!(chunk.bboxes().is_empty());
        assert!(matches!(
            ChunkBboxes::from_json("{bad json"),
            Err(SegmentError::MalformedBboxJson(_))
        ));
    }

    #[test]
    fn test_missing_bbox_is_empty() {
        assert!(Chunk::new(0, "text").bboxes().is_empty());
    }

    #[test]
    fn test_chunk_accepts_camel_case_index() {
        let chunk: Chunk =
            serde_json::from_str(r#"{"chunkIndex": 4, "text": "x", "bbox": null}"#).unwrap();
        assert_eq!(chunk.chunk_index, 4);
        assert!(chunk.bbox.is_none());
    }
}
