//! Document sources.
//!
//! A [`DocumentSource`] supplies the two independent decompositions of a
//! document: its layout partitions and its retrieval chunks. Fetching is
//! asynchronous, applying is not; [`load_document`] bridges the two through a
//! [`LoadTicket`] so that a load overtaken by a newer one is discarded.
//!
//! [`LoadTicket`]: crate::LoadTicket

use std::path::{Path, PathBuf};

use crate::chunk::Chunk;
use crate::partition::{PartitionPayload, PartitionStore};
use crate::session::{Delivery, DocumentRef, ReconcileSession};
use crate::{Result, TRACING_TARGET_SOURCE};

/// File name suffix of partition payloads in a [`JsonFileSource`].
pub const PARTITIONS_SUFFIX: &str = "partitions.json";

/// File name suffix of chunk lists in a [`JsonFileSource`].
pub const CHUNKS_SUFFIX: &str = "chunks.json";

/// Supplier of partitions and chunks.
#[async_trait::async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetches the raw layout payload of a document.
    async fn get_partitions(&self, document: &DocumentRef) -> Result<PartitionPayload>;

    /// Fetches the chunk list of a document.
    async fn get_chunks(&self, document: &DocumentRef) -> Result<Vec<Chunk>>;
}

/// Source reading `<document>.partitions.json` and `<document>.chunks.json`
/// from a directory.
///
/// A document without a partitions file is treated as having no spatial
/// layout.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    root: PathBuf,
}

impl JsonFileSource {
    /// Creates a source rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, document: &DocumentRef, suffix: &str) -> PathBuf {
        self.root.join(format!("{document}.{suffix}"))
    }
}

#[async_trait::async_trait]
impl DocumentSource for JsonFileSource {
    async fn get_partitions(&self, document: &DocumentRef) -> Result<PartitionPayload> {
        let path = self.path(document, PARTITIONS_SUFFIX);
        if !tokio::fs::try_exists(&path).await? {
            tracing::debug!(
                target: TRACING_TARGET_SOURCE,
                document = %document,
                path = %path.display(),
                "No partitions file, document has no layout"
            );
            return Ok(PartitionPayload::new());
        }

        let raw = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn get_chunks(&self, document: &DocumentRef) -> Result<Vec<Chunk>> {
        let path = self.path(document, CHUNKS_SUFFIX);
        let raw = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Fetches a document from the source and applies it to the session.
///
/// The ticket is taken before fetching, so if another load of the session
/// begins while this one is in flight, this delivery is dropped.
pub async fn load_document<S>(
    session: &mut ReconcileSession,
    source: &S,
    document: impl Into<DocumentRef>,
) -> Result<Delivery>
where
    S: DocumentSource + ?Sized,
{
    let ticket = session.begin_load(document);
    let document = ticket.document().clone();

    tracing::debug!(
        target: TRACING_TARGET_SOURCE,
        document = %document,
        generation = ticket.generation(),
        "Fetching document"
    );

    let payload = source.get_partitions(&document).await?;
    let chunks = source.get_chunks(&document).await?;
    let partitions = PartitionStore::from_payload(payload);

    Ok(session.apply_document(ticket, partitions, chunks))
}

/// Fetches the chunk list of the session's document and applies it.
///
/// Returns `None` if the session has no document loaded.
pub async fn refresh_chunks<S>(
    session: &mut ReconcileSession,
    source: &S,
) -> Result<Option<Delivery>>
where
    S: DocumentSource + ?Sized,
{
    let Some(ticket) = session.begin_chunk_refresh() else {
        return Ok(None);
    };

    let chunks = source.get_chunks(ticket.document()).await?;
    Ok(Some(session.apply_chunks(ticket, chunks)))
}
