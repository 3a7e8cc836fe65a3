//! GTD task store library
//!
//! Tasks, boards and perspectives persisted as Markdown files with YAML
//! frontmatter, held in memory for querying, and written back with
//! debounced atomic saves.

pub mod activity;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod frontmatter;
pub mod logging;
pub mod paths;
pub mod perspective;
pub mod query;
pub mod store;
pub mod types;
pub mod watcher;
