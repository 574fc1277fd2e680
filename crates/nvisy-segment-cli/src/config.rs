//! CLI configuration.
//!
//! ```text
//! Cli
//! ├── segment: SegmentConfig   # Scroll anchor, label map cache
//! └── command: Command         # inspect | override
//! ```
//!
//! Every session setting can be provided as an argument or an environment
//! variable. Use `--help` to see all available options.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use nvisy_segment::{LabelToggle, SegmentConfig};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_COMMAND, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "nvisy-segment")]
#[command(about = "Reconcile document chunks with their layout regions")]
#[command(version)]
pub struct Cli {
    /// Session configuration.
    #[clap(flatten)]
    pub segment: SegmentConfig,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Shows the layout regions of a chunk and where it would scroll to.
    Inspect(DocumentArgs),
    /// Toggles regions of a chunk and re-derives its text from them.
    Override(OverrideArgs),
}

/// Document files and the chunk to work on.
#[derive(Debug, Clone, Args)]
pub struct DocumentArgs {
    /// Partition payload file. Without it the document has no layout.
    #[arg(long, env = "SEGMENT_PARTITIONS")]
    pub partitions: Option<PathBuf>,

    /// Chunk list file.
    #[arg(long, env = "SEGMENT_CHUNKS")]
    pub chunks: PathBuf,

    /// Index of the chunk to select.
    #[arg(long)]
    pub chunk: u32,
}

/// Arguments of the override command.
#[derive(Debug, Clone, Args)]
pub struct OverrideArgs {
    #[clap(flatten)]
    pub document: DocumentArgs,

    /// Region toggle as `<label-id>=on|off`. May be repeated.
    #[arg(long = "toggle", value_parser = parse_toggle)]
    pub toggles: Vec<LabelToggle>,

    /// Writes the updated chunk list back to the chunks file.
    #[arg(long)]
    pub write_back: bool,
}

/// Parses a `<label-id>=on|off` toggle argument.
fn parse_toggle(input: &str) -> Result<LabelToggle, String> {
    let (id, state) = input
        .rsplit_once('=')
        .ok_or_else(|| format!("expected <label-id>=on|off, got '{input}'"))?;

    let active = match state {
        "on" | "true" => true,
        "off" | "false" => false,
        other => return Err(format!("unknown toggle state '{other}', expected on or off")),
    };

    LabelToggle::parse(id, active).map_err(|error| error.to_string())
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments, so its variables
    /// act as defaults for env-backed flags.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    ///
    /// Logs go to stderr so that stdout only carries the command's JSON.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    /// Logs build information and the session configuration.
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = std::process::id(),
            features = ?enabled_features(),
            "starting nvisy-segment"
        );

        tracing::debug!(
            target: TRACING_TARGET_COMMAND,
            scroll_anchor = ?self.segment.scroll_anchor,
            max_cached_chunks = self.segment.max_cached_chunks,
            "session configuration"
        );
    }
}

/// Returns a list of enabled compile-time features.
fn enabled_features() -> Vec<&'static str> {
    [cfg!(feature = "dotenv").then_some("dotenv")]
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_override_args() {
        let cli = Cli::try_parse_from([
            "nvisy-segment",
            "--scroll-anchor",
            "reading-order",
            "override",
            "--chunks",
            "doc.chunks.json",
            "--chunk",
            "2",
            "--toggle",
            "1-0-0-100-10=off",
            "--toggle",
            "2-5.5-0-100-10=on",
        ])
        .unwrap();

        assert_eq!(
            cli.segment.scroll_anchor,
            nvisy_segment::ScrollAnchor::ReadingOrder
        );
        let Command::Override(args) = cli.command else {
            panic!("expected override command");
        };
        assert_eq!(args.document.chunk, 2);
        assert!(args.document.partitions.is_none());
        assert_eq!(args.toggles.len(), 2);
        assert!(!args.toggles[0].active);
        assert!(args.toggles[1].active);
        assert_eq!(args.toggles[1].key.to_string(), "2-5.5-0-100-10");
    }

    #[test]
    fn test_parse_toggle_rejects_bad_input() {
        assert!(parse_toggle("1-0-0-100-10").is_err());
        assert!(parse_toggle("1-0-0-100-10=maybe").is_err());
        assert!(parse_toggle("p1=on").is_err());
    }
}
