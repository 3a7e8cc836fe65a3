//! CLI command definitions for `gtd`.
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod perspective;
pub mod task;

use clap::{Parser, Subcommand};
use perspective::PerspectiveCommand;
use std::path::PathBuf;
use task::{AddArgs, ListArgs, ReopenArgs};

/// GTD task store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Store root directory (overrides config)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Output format: markdown (default) or json
    #[arg(short, long, global = true)]
    pub format: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the directory layout and seed built-in boards and perspectives
    Init,

    /// Capture a new task
    Add(AddArgs),

    /// List tasks
    List(ListArgs),

    /// Free-text search over title, body, project, context and tags
    Search {
        query: String,
    },

    /// Mark a task completed (moves it to the archive)
    Complete {
        /// Task id or unique id prefix
        id: String,
    },

    /// Reopen a completed task
    Reopen(ReopenArgs),

    /// Delete tasks and their files
    Delete {
        /// Task ids or unique id prefixes
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// List known projects
    Projects,

    /// List known contexts
    Contexts,

    /// Report record files that fail to parse
    Check,

    /// Reload stores whenever record files change on disk
    Watch,

    /// Saved queries
    #[command(subcommand)]
    Perspective(PerspectiveCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["gtd", "projects", "--root", "/tmp/gtd", "-v"]);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/gtd")));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Projects));
    }
}
