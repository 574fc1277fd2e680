//! Document source backed by explicitly named files.

use std::path::{Path, PathBuf};

use nvisy_segment::{Chunk, DocumentRef, DocumentSource, PartitionPayload, Result};

use crate::config::DocumentArgs;

/// Reads partitions and chunks from the files given on the command line.
#[derive(Debug, Clone)]
pub struct FileSource {
    partitions: Option<PathBuf>,
    chunks: PathBuf,
}

impl FileSource {
    /// Returns the document reference used for these files.
    pub fn document(&self) -> DocumentRef {
        DocumentRef::new(self.chunks.display().to_string())
    }

    /// Returns the chunk list file.
    pub fn chunks_path(&self) -> &Path {
        &self.chunks
    }
}

impl From<&DocumentArgs> for FileSource {
    fn from(args: &DocumentArgs) -> Self {
        Self {
            partitions: args.partitions.clone(),
            chunks: args.chunks.clone(),
        }
    }
}

#[async_trait::async_trait]
impl DocumentSource for FileSource {
    async fn get_partitions(&self, _document: &DocumentRef) -> Result<PartitionPayload> {
        let Some(path) = &self.partitions else {
            return Ok(PartitionPayload::new());
        };

        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn get_chunks(&self, _document: &DocumentRef) -> Result<Vec<Chunk>> {
        let raw = tokio::fs::read_to_string(&self.chunks).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}
