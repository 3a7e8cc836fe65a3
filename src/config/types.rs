//! Configuration types.

use crate::format::OutputFormat;
use crate::paths::DEFAULT_SLUG_MAX_LEN;
use crate::store::{DEFAULT_DEBOUNCE, FileStore, StoreOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Where and how records are persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store root directory.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Quiet period before a mutated record is written.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Maximum length of the title slug in task filenames.
    #[serde(default = "default_slug_max_len")]
    pub slug_max_len: usize,

    /// Seed the built-in boards and perspectives when opening a root.
    #[serde(default = "default_true")]
    pub seed_builtins: bool,

    /// Create boards for newly seen projects and contexts.
    #[serde(default = "default_true")]
    pub auto_boards: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            debounce_ms: default_debounce_ms(),
            slug_max_len: default_slug_max_len(),
            seed_builtins: true,
            auto_boards: true,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("gtd")
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

fn default_slug_max_len() -> usize {
    DEFAULT_SLUG_MAX_LEN
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

impl Config {
    /// Load a single configuration file, no tier merging.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.storage.debounce_ms)
    }

    pub fn file_store(&self) -> FileStore {
        FileStore::new(&self.storage.root).with_slug_max_len(self.storage.slug_max_len)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::default().with_debounce(self.debounce())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.storage.slug_max_len, 50);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = serde_yaml::from_str("storage:\n  debounce_ms: 50\n").unwrap();
        assert_eq!(config.storage.debounce_ms, 50);
        assert_eq!(config.storage.root, PathBuf::from("gtd"));
        assert!(config.storage.seed_builtins);
    }
}
