//! Segment error types.

use strum::{AsRefStr, IntoStaticStr};

use crate::geometry::LabelKey;

/// Result type alias for segment operations.
pub type Result<T, E = SegmentError> = std::result::Result<T, E>;

/// Message shown to the user when an override references a part that no
/// longer exists in the loaded partitions.
const STALE_DOCUMENT_MESSAGE: &str = "document stale, please re-upload";

/// Categories of errors that can occur in segment operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// A chunk's stored bbox string could not be parsed.
    MalformedBboxJson,
    /// A label no longer resolves to a part of the loaded partitions.
    StalePartitionReference,
    /// A chunk index is not part of the current chunk list.
    OrphanedChunkIndex,
    /// The active set re-derived to an empty text.
    EmptyOverrideResult,
    /// No chunk is currently selected.
    NoChunkSelected,
    /// The loaded document has no spatial layout.
    NoLayout,
    /// A label id could not be parsed.
    InvalidLabelKey,
    /// Serialization/deserialization error.
    Serialization,
    /// I/O error.
    Io,
}

/// Segment error type.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    /// The chunk's stored bbox string is not valid `chunk_bboxes` JSON.
    #[error("malformed chunk bbox json: {0}")]
    MalformedBboxJson(#[source] serde_json::Error),

    /// A label references a part missing from the current partitions.
    #[error("stale partition reference: {key}")]
    StalePartitionReference { key: LabelKey },

    /// The addressed chunk index is not in the current chunk list.
    #[error("chunk index {chunk_index} is not in the current chunk list")]
    OrphanedChunkIndex { chunk_index: u32 },

    /// The active set re-derived to an empty text.
    #[error("override of chunk {chunk_index} produced empty text")]
    EmptyOverrideResult { chunk_index: u32 },

    /// No chunk is currently selected.
    #[error("no chunk selected")]
    NoChunkSelected,

    /// The loaded document has no spatial layout.
    #[error("document has no spatial layout")]
    NoLayout,

    /// A label id could not be parsed into a key.
    #[error("invalid label key '{input}': {reason}")]
    InvalidLabelKey { input: String, reason: &'static str },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SegmentError {
    /// Creates an invalid label key error.
    pub fn invalid_label_key(input: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidLabelKey {
            input: input.into(),
            reason,
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedBboxJson(_) => ErrorKind::MalformedBboxJson,
            Self::StalePartitionReference { .. } => ErrorKind::StalePartitionReference,
            Self::OrphanedChunkIndex { .. } => ErrorKind::OrphanedChunkIndex,
            Self::EmptyOverrideResult { .. } => ErrorKind::EmptyOverrideResult,
            Self::NoChunkSelected => ErrorKind::NoChunkSelected,
            Self::NoLayout => ErrorKind::NoLayout,
            Self::InvalidLabelKey { .. } => ErrorKind::InvalidLabelKey,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Returns the error kind as a string.
    pub fn kind_str(&self) -> &'static str {
        self.kind().into()
    }

    /// Returns true if this error should be shown to the user.
    ///
    /// Malformed bbox strings and orphaned chunk indices are normal lifecycle
    /// churn and are only logged.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::StalePartitionReference { .. }
                | Self::EmptyOverrideResult { .. }
                | Self::NoChunkSelected
                | Self::NoLayout
        )
    }

    /// Returns the message to display to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::StalePartitionReference { .. } => STALE_DOCUMENT_MESSAGE.to_owned(),
            Self::EmptyOverrideResult { .. } => {
                "the selected regions contain no text, select at least one region".to_owned()
            }
            other => other.to_string(),
        }
    }
}
