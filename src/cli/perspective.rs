//! Perspective subcommands.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum PerspectiveCommand {
    /// List saved perspectives
    List,

    /// Run a perspective and print its tasks
    Show {
        /// Perspective name or id
        perspective: String,
    },

    /// Export a perspective to a shareable file
    Export(ExportArgs),

    /// Import a perspective export (plain or gzip) under a new id
    Import {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

/// Arguments for `gtd perspective export`
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Perspective name or id
    pub perspective: String,

    /// Output file path (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Force gzip compression (auto-detected from .gz extension otherwise)
    #[arg(long)]
    pub gzip: bool,
}

impl ExportArgs {
    /// Explicit `--gzip` wins; otherwise compress when writing a `.gz` file.
    pub fn should_compress(&self) -> bool {
        self.gzip
            || self
                .output
                .as_ref()
                .and_then(|p| p.extension())
                .is_some_and(|ext| ext == "gz")
    }
}
