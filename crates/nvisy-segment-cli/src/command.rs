//! Command implementations.

use std::collections::BTreeMap;

use anyhow::Context;
use nvisy_segment::{
    Label, OverrideCommit, ReconcileSession, ScrollTarget, SegmentConfig, load_document,
};
use serde::Serialize;

use crate::TRACING_TARGET_COMMAND;
use crate::config::{DocumentArgs, OverrideArgs};
use crate::source::FileSource;

/// Output of the inspect command.
#[derive(Debug, Serialize)]
struct Inspection<'a> {
    chunk_index: u32,
    text: &'a str,
    scroll_target: ScrollTarget,
    override_pending: bool,
    active_labels: BTreeMap<u32, Vec<Label>>,
}

/// Loads the document and selects the requested chunk.
async fn open(
    config: &SegmentConfig,
    args: &DocumentArgs,
) -> anyhow::Result<(ReconcileSession, FileSource, ScrollTarget)> {
    let source = FileSource::from(args);
    let mut session = ReconcileSession::new(config.clone());

    load_document(&mut session, &source, source.document())
        .await
        .with_context(|| format!("failed to load '{}'", source.document()))?;

    if session.chunk(args.chunk).is_none() {
        anyhow::bail!("chunk {} is not in the chunk list", args.chunk);
    }

    let target = session.select_chunk(args.chunk);
    tracing::debug!(
        target: TRACING_TARGET_COMMAND,
        chunk_index = args.chunk,
        labels = session.labels().len(),
        active = session.selection().len(),
        "document loaded"
    );

    Ok((session, source, target))
}

/// Prints the active labels of a chunk grouped by page.
pub async fn inspect(config: &SegmentConfig, args: &DocumentArgs) -> anyhow::Result<()> {
    let (session, _, scroll_target) = open(config, args).await?;
    let chunk = session
        .selected_chunk()
        .context("chunk is no longer selected")?;

    let inspection = Inspection {
        chunk_index: chunk.chunk_index,
        text: &chunk.text,
        scroll_target,
        override_pending: session.is_override_pending(),
        active_labels: session.active_labels_by_page(),
    };

    println!("{}", serde_json::to_string_pretty(&inspection)?);
    Ok(())
}

/// Applies toggles to a chunk and commits the re-derived text.
pub async fn override_chunk(config: &SegmentConfig, args: &OverrideArgs) -> anyhow::Result<()> {
    let (mut session, source, _) = open(config, &args.document).await?;
    session.toggle(&args.toggles);

    let commit: OverrideCommit = match session.commit_override() {
        Ok(commit) => commit,
        Err(error) if error.is_user_facing() => {
            tracing::warn!(
                target: TRACING_TARGET_COMMAND,
                kind = error.kind_str(),
                "override rejected"
            );
            anyhow::bail!(error.user_message());
        }
        Err(error) => return Err(error).context("failed to commit override"),
    };

    if args.write_back {
        let path = source.chunks_path();
        let json = serde_json::to_string_pretty(session.chunks())?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("failed to write '{}'", path.display()))?;

        tracing::info!(
            target: TRACING_TARGET_COMMAND,
            chunk_index = commit.chunk_index,
            path = %path.display(),
            "chunk list updated"
        );
    }

    println!("{}", serde_json::to_string_pretty(&commit)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use nvisy_segment::{Chunk, LabelToggle};

    use super::*;

    const PARTITIONS: &str = r#"{
        "1-0-0-100-10": {"text": "Title", "type": "Title", "part_id": "a"},
        "1-0-10-100-20": {"text": "Body", "type": "Paragraph", "part_id": "b"}
    }"#;

    const CHUNKS: &str = r#"[
        {"chunk_index": 0, "text": "Title Body",
         "bbox": "{\"chunk_bboxes\":[{\"page\":1,\"bbox\":[0,0,100,10]},{\"page\":1,\"bbox\":[0,10,100,20]}]}"}
    ]"#;

    fn document(dir: &Path) -> DocumentArgs {
        let partitions = dir.join("doc.partitions.json");
        let chunks = dir.join("doc.chunks.json");
        std::fs::write(&partitions, PARTITIONS).unwrap();
        std::fs::write(&chunks, CHUNKS).unwrap();

        DocumentArgs {
            partitions: Some(partitions),
            chunks,
            chunk: 0,
        }
    }

    #[tokio::test]
    async fn test_override_writes_back() {
        let dir = tempfile::tempdir().unwrap();
        let args = OverrideArgs {
            document: document(dir.path()),
            toggles: Vec::new(),
            write_back: true,
        };

        override_chunk(&SegmentConfig::default(), &args).await.unwrap();

        let raw = std::fs::read_to_string(&args.document.chunks).unwrap();
        let chunks: Vec<Chunk> = serde_json::from_str(&raw).unwrap();
        assert_eq!(chunks[0].text, "Title\nBody");
    }

    #[tokio::test]
    async fn test_empty_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = OverrideArgs {
            document: document(dir.path()),
            toggles: vec![
                LabelToggle::parse("1-0-0-100-10", false).unwrap(),
                LabelToggle::parse("1-0-10-100-20", false).unwrap(),
            ],
            write_back: true,
        };

        let error = override_chunk(&SegmentConfig::default(), &args)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("no text"));

        let raw = std::fs::read_to_string(&args.document.chunks).unwrap();
        assert_eq!(raw, CHUNKS);
    }

    #[tokio::test]
    async fn test_unknown_chunk_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = document(dir.path());
        args.chunk = 7;

        assert!(inspect(&SegmentConfig::default(), &args).await.is_err());
    }
}
