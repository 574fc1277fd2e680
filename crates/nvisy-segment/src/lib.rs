#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for label map construction.
pub const TRACING_TARGET_BUILDER: &str = "nvisy_segment::builder";

/// Tracing target for label activation toggles.
pub const TRACING_TARGET_SELECTION: &str = "nvisy_segment::selection";

/// Tracing target for chunk text re-derivation.
pub const TRACING_TARGET_OVERRIDE: &str = "nvisy_segment::override";

/// Tracing target for session lifecycle events.
///
/// Use this target for chunk selection, chunk list changes, document swaps
/// and dropped deliveries.
pub const TRACING_TARGET_SESSION: &str = "nvisy_segment::session";

/// Tracing target for document source operations.
pub const TRACING_TARGET_SOURCE: &str = "nvisy_segment::source";

mod builder;
mod chunk;
mod config;
mod error;
mod geometry;
mod label;
mod partition;
mod position;
mod rederive;
mod selection;
mod session;
pub mod source;

pub use builder::{LabelBuild, build_label_map};
pub use chunk::{Chunk, ChunkBbox, ChunkBboxes};
pub use config::{DEFAULT_MAX_CACHED_CHUNKS, SegmentConfig};
pub use error::{ErrorKind, Result, SegmentError};
pub use geometry::{BoundingBox, LabelKey};
pub use label::{Label, LabelMap};
pub use partition::{Part, PartType, PartitionPayload, PartitionStore, RawPart};
pub use position::{
    PositionResolver, ScrollAnchor, ScrollTarget, resolve_scroll_target, visible_page,
};
pub use rederive::override_chunk_text;
pub use selection::{ActiveSelection, LabelToggle, toggle_labels};
pub use session::{Delivery, DocumentRef, LoadTicket, OverrideCommit, ReconcileSession};
pub use source::{DocumentSource, JsonFileSource, load_document, refresh_chunks};
