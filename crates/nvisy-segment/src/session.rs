//! Chunk lifecycle and session state.
//!
//! [`ReconcileSession`] owns every piece of mutable state of one loaded
//! document: the partitions, the chunk list, the live label map of the
//! selected chunk, the active selection and the per-chunk cache of committed
//! label maps. All operations are synchronous; a selection's label map is
//! fully built before the call returns, so toggles always apply to the map of
//! the chunk they were made on.
//!
//! Data arriving from asynchronous fetches is applied through a
//! [`LoadTicket`]. Only the most recently issued ticket of each kind is
//! honored, older deliveries are dropped without touching the state.

use std::collections::{BTreeMap, HashSet};

use derive_more::{AsRef, Display, From};
use indexmap::IndexMap;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::builder::{LabelBuild, build_label_map};
use crate::chunk::Chunk;
use crate::config::SegmentConfig;
use crate::geometry::LabelKey;
use crate::label::{Label, LabelMap};
use crate::partition::PartitionStore;
use crate::position::{PositionResolver, ScrollTarget, visible_page};
use crate::rederive::override_chunk_text;
use crate::selection::{ActiveSelection, LabelToggle, toggle_labels};
use crate::{Result, SegmentError, TRACING_TARGET_SESSION};

/// Opaque reference to a document, as understood by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, Display, From, AsRef)]
#[serde(transparent)]
pub struct DocumentRef(
    #[from]
    #[as_ref]
    String,
);

impl DocumentRef {
    /// Creates a new document reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentRef {
    fn from(reference: &str) -> Self {
        Self::new(reference)
    }
}

/// Tag identifying one asynchronous delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    document: DocumentRef,
    generation: u64,
}

impl LoadTicket {
    /// Document the delivery belongs to.
    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    /// Generation the ticket was issued at.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Outcome of applying a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The delivery was current and has been applied.
    Applied,
    /// A newer request superseded the delivery; nothing changed.
    Dropped,
}

impl Delivery {
    /// Returns true if the delivery was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Result of a committed override, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideCommit {
    /// Chunk the override was written to.
    pub chunk_index: u32,
    /// Re-derived chunk text.
    pub text: String,
    /// Serialized `chunk_bboxes` of the committed selection.
    pub bbox: String,
    /// When the override was committed.
    pub committed_at: Timestamp,
}

/// State of one loaded document and its selected chunk.
#[derive(Debug, Clone, Default)]
pub struct ReconcileSession {
    config: SegmentConfig,

    document: Option<DocumentRef>,
    partitions: PartitionStore,
    chunks: Vec<Chunk>,

    selected: Option<u32>,
    labels: LabelMap,
    selection: ActiveSelection,
    saved_keys: HashSet<LabelKey>,
    cache: IndexMap<u32, LabelMap>,

    position: PositionResolver,
    visible_page: Option<u32>,

    next_generation: u64,
    latest_load: u64,
    latest_refresh: u64,
    loaded_generation: u64,
}

impl ReconcileSession {
    /// Creates an empty session.
    pub fn new(config: SegmentConfig) -> Self {
        Self {
            position: PositionResolver::new(config.scroll_anchor),
            config,
            ..Self::default()
        }
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Starts loading a document and returns the ticket its data must carry.
    ///
    /// Any earlier load still in flight is superseded.
    pub fn begin_load(&mut self, document: impl Into<DocumentRef>) -> LoadTicket {
        let generation = self.issue_generation();
        self.latest_load = generation;
        LoadTicket {
            document: document.into(),
            generation,
        }
    }

    /// Starts refreshing the chunk list of the current document.
    ///
    /// Returns `None` if no document is loaded.
    pub fn begin_chunk_refresh(&mut self) -> Option<LoadTicket> {
        let document = self.document.clone()?;
        let generation = self.issue_generation();
        self.latest_refresh = generation;
        Some(LoadTicket {
            document,
            generation,
        })
    }

    fn issue_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Applies a fetched document.
    ///
    /// A new document invalidates every cached label map, the selection and
    /// the live label map.
    pub fn apply_document(
        &mut self,
        ticket: LoadTicket,
        partitions: PartitionStore,
        chunks: Vec<Chunk>,
    ) -> Delivery {
        if ticket.generation != self.latest_load {
            tracing::debug!(
                target: TRACING_TARGET_SESSION,
                document = %ticket.document,
                generation = ticket.generation,
                latest = self.latest_load,
                "Dropping superseded document delivery"
            );
            return Delivery::Dropped;
        }

        tracing::info!(
            target: TRACING_TARGET_SESSION,
            document = %ticket.document,
            parts = partitions.len(),
            chunks = chunks.len(),
            evicted = self.cache.len(),
            "Loaded document"
        );

        self.document = Some(ticket.document);
        self.loaded_generation = ticket.generation;
        self.partitions = partitions;
        self.chunks = chunks;
        self.cache.clear();
        self.visible_page = None;
        self.clear_selection();

        Delivery::Applied
    }

    /// Loads a document synchronously.
    pub fn load(
        &mut self,
        document: impl Into<DocumentRef>,
        partitions: PartitionStore,
        chunks: Vec<Chunk>,
    ) {
        let ticket = self.begin_load(document);
        self.apply_document(ticket, partitions, chunks);
    }

    /// Applies a fetched chunk list of the current document.
    pub fn apply_chunks(&mut self, ticket: LoadTicket, chunks: Vec<Chunk>) -> Delivery {
        let current = self.document.as_ref() == Some(&ticket.document)
            && ticket.generation == self.latest_refresh
            && ticket.generation > self.loaded_generation;

        if !current {
            tracing::debug!(
                target: TRACING_TARGET_SESSION,
                document = %ticket.document,
                generation = ticket.generation,
                "Dropping superseded chunk delivery"
            );
            return Delivery::Dropped;
        }

        self.replace_chunks(chunks);
        Delivery::Applied
    }

    /// Replaces the chunk list after chunks were added, edited or removed.
    ///
    /// Cached label maps of chunks that disappeared are evicted. If the
    /// selected chunk disappeared, the selection is cleared; otherwise its
    /// label map is rebuilt against the new list.
    pub fn replace_chunks(&mut self, chunks: Vec<Chunk>) {
        let present: HashSet<u32> = chunks.iter().map(|chunk| chunk.chunk_index).collect();
        let before = self.cache.len();
        self.cache.retain(|chunk_index, _| present.contains(chunk_index));
        self.chunks = chunks;

        tracing::debug!(
            target: TRACING_TARGET_SESSION,
            chunks = self.chunks.len(),
            evicted = before - self.cache.len(),
            "Replaced chunk list"
        );

        match self.selected {
            Some(chunk_index) if !present.contains(&chunk_index) => {
                tracing::debug!(
                    target: TRACING_TARGET_SESSION,
                    error = %SegmentError::OrphanedChunkIndex { chunk_index },
                    "Clearing selection of removed chunk"
                );
                self.clear_selection();
            }
            Some(chunk_index) => {
                let first_active = self.rebuild_live();
                let target = self.position.start(&self.labels, first_active);
                tracing::debug!(
                    target: TRACING_TARGET_SESSION,
                    chunk_index,
                    active = self.selection.len(),
                    page = target.page,
                    "Rebuilt selected chunk"
                );
            }
            None => {}
        }
    }

    /// Records an out-of-band edit of a chunk's text.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::OrphanedChunkIndex`] if the chunk is unknown.
    pub fn update_chunk_text(&mut self, chunk_index: u32, text: impl Into<String>) -> Result<()> {
        let chunk = self
            .chunk_mut(chunk_index)
            .ok_or(SegmentError::OrphanedChunkIndex { chunk_index })?;
        chunk.text = text.into();
        Ok(())
    }

    /// Selects a chunk and returns where the surface should scroll to.
    ///
    /// A cached label map from an earlier override of the chunk takes
    /// precedence over its stored bounding boxes. Selecting an index that is
    /// not in the chunk list clears the selection.
    pub fn select_chunk(&mut self, chunk_index: u32) -> ScrollTarget {
        if self.chunk(chunk_index).is_none() {
            tracing::debug!(
                target: TRACING_TARGET_SESSION,
                error = %SegmentError::OrphanedChunkIndex { chunk_index },
                "Ignoring selection of unknown chunk"
            );
            self.cache.shift_remove(&chunk_index);
            self.clear_selection();
            return ScrollTarget::NONE;
        }

        self.selected = Some(chunk_index);
        let first_active = self.rebuild_live();
        let target = self.position.start(&self.labels, first_active);

        tracing::debug!(
            target: TRACING_TARGET_SESSION,
            chunk_index,
            cached = self.cache.contains_key(&chunk_index),
            active = self.selection.len(),
            page = target.page,
            "Selected chunk"
        );

        target
    }

    /// Clears the selected chunk, its label map and the active selection.
    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.labels = LabelMap::new();
        self.selection = ActiveSelection::default();
        self.saved_keys.clear();
        self.position.clear();
    }

    /// Rebuilds the live map of the selected chunk.
    ///
    /// Returns the first active label of the map, the initial scroll target.
    fn rebuild_live(&mut self) -> Option<LabelKey> {
        let chunk_index = self.selected?;
        let chunk = self.chunks.iter().find(|c| c.chunk_index == chunk_index)?;

        let stored = build_label_map(&self.partitions, Some(chunk));
        self.saved_keys = stored.labels.active_keys();
        let build = match self.cache.get(&chunk_index) {
            Some(cached) => LabelBuild::from(cached.clone()),
            None => stored,
        };

        self.labels = build.labels;
        self.selection = self.labels.selection();
        build.first_active
    }

    /// Applies label toggles from the rendering surface.
    ///
    /// Has no effect while no chunk is selected.
    pub fn toggle(&mut self, toggles: &[LabelToggle]) -> &ActiveSelection {
        if self.selected.is_some() {
            self.selection = toggle_labels(&mut self.labels, toggles);
        }
        &self.selection
    }

    /// Applies a single toggle reported with the surface's textual label id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id cannot be parsed.
    pub fn toggle_label(&mut self, label_id: &str, active: bool) -> Result<&ActiveSelection> {
        let toggle = LabelToggle::parse(label_id, active)?;
        Ok(self.toggle(&[toggle]))
    }

    /// Re-issues the scroll request for the selected chunk.
    pub fn locate(&mut self) -> ScrollTarget {
        if self.selected.is_none() {
            return ScrollTarget::NONE;
        }
        self.position.request(&self.labels)
    }

    /// Records a scroll report of the rendering surface.
    ///
    /// Returns the page now under the viewport, if it could be determined.
    pub fn on_page_scrolled(
        &mut self,
        offset: f64,
        viewport_height: f64,
        page_height: f64,
        scale: f64,
    ) -> Option<u32> {
        if let Some(page) = visible_page(offset, viewport_height, page_height, scale) {
            self.visible_page = Some(page);
        }
        self.visible_page
    }

    /// Returns true if the active set differs from the chunk's saved regions.
    pub fn is_override_pending(&self) -> bool {
        self.selected.is_some() && self.labels.active_keys() != self.saved_keys
    }

    /// Re-derives the selected chunk's text from the active set and writes it back.
    ///
    /// The chunk receives the new text and the serialized selection, and the
    /// label map is cached so a later re-selection restores it.
    ///
    /// # Errors
    ///
    /// Fails without modifying the chunk if nothing is selected, the document
    /// has no layout, a label no longer resolves to a part, or the text would
    /// be empty.
    pub fn commit_override(&mut self) -> Result<OverrideCommit> {
        let chunk_index = self.selected.ok_or(SegmentError::NoChunkSelected)?;
        if self.partitions.is_empty() {
            return Err(SegmentError::NoLayout);
        }

        let text = override_chunk_text(&self.labels, &self.partitions)?;
        if text.trim().is_empty() {
            tracing::warn!(
                target: TRACING_TARGET_SESSION,
                chunk_index,
                "Rejecting empty override"
            );
            return Err(SegmentError::EmptyOverrideResult { chunk_index });
        }

        let bbox = self.selection.to_bboxes().to_json()?;
        let chunk = self
            .chunk_mut(chunk_index)
            .ok_or(SegmentError::OrphanedChunkIndex { chunk_index })?;
        chunk.text = text.clone();
        chunk.bbox = Some(bbox.clone());

        self.saved_keys = self.labels.active_keys();
        self.cache_labels(chunk_index);

        tracing::info!(
            target: TRACING_TARGET_SESSION,
            chunk_index,
            regions = self.selection.len(),
            characters = text.chars().count(),
            "Committed override"
        );

        Ok(OverrideCommit {
            chunk_index,
            text,
            bbox,
            committed_at: Timestamp::now(),
        })
    }

    fn cache_labels(&mut self, chunk_index: u32) {
        self.cache.shift_remove(&chunk_index);
        self.cache.insert(chunk_index, self.labels.clone());

        if let Some(limit) = self.config.cache_limit() {
            while self.cache.len() > limit {
                self.cache.shift_remove_index(0);
            }
        }
    }

    fn chunk_mut(&mut self, chunk_index: u32) -> Option<&mut Chunk> {
        self.chunks.iter_mut().find(|c| c.chunk_index == chunk_index)
    }

    /// Returns the loaded document.
    pub fn document(&self) -> Option<&DocumentRef> {
        self.document.as_ref()
    }

    /// Returns the partitions of the loaded document.
    pub fn partitions(&self) -> &PartitionStore {
        &self.partitions
    }

    /// Returns the chunk list.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Returns the chunk with the given index.
    pub fn chunk(&self, chunk_index: u32) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.chunk_index == chunk_index)
    }

    /// Returns the index of the selected chunk.
    pub fn selected_index(&self) -> Option<u32> {
        self.selected
    }

    /// Returns the selected chunk.
    pub fn selected_chunk(&self) -> Option<&Chunk> {
        self.selected.and_then(|chunk_index| self.chunk(chunk_index))
    }

    /// Returns the live label map.
    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Returns the active selection.
    pub fn selection(&self) -> &ActiveSelection {
        &self.selection
    }

    /// Returns all labels grouped by page.
    pub fn labels_by_page(&self) -> BTreeMap<u32, Vec<Label>> {
        self.labels.labels_by_page()
    }

    /// Returns the active labels grouped by page.
    pub fn active_labels_by_page(&self) -> BTreeMap<u32, Vec<Label>> {
        self.labels.active_labels_by_page()
    }

    /// Returns the last issued scroll target.
    pub fn scroll_target(&self) -> ScrollTarget {
        self.position.current()
    }

    /// Returns the page last reported under the viewport.
    pub fn visible_page(&self) -> Option<u32> {
        self.visible_page
    }

    /// Returns true if a committed label map is cached for the chunk.
    pub fn is_cached(&self, chunk_index: u32) -> bool {
        self.cache.contains_key(&chunk_index)
    }

    /// Returns the number of cached label maps.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
