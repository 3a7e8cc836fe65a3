//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::merge_layers;
use super::types::Config;
use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Explicit config file; skips every other tier.
pub const ENV_CONFIG_PATH: &str = "GTD_CONFIG_PATH";
pub const ENV_ROOT: &str = "GTD_ROOT";
pub const ENV_DEBOUNCE_MS: &str = "GTD_DEBOUNCE_MS";
pub const ENV_LOG_LEVEL: &str = "GTD_LOG_LEVEL";
pub const ENV_USER_DIR: &str = "GTD_USER_DIR";
pub const ENV_PROJECT_DIR: &str = "GTD_PROJECT_DIR";

const CONFIG_FILE: &str = "config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    /// `./gtd/config.yaml`
    Project = 1,
    /// `~/.gtd/config.yaml`
    User = 2,
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        let user_dir = std::env::var(ENV_USER_DIR)
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".gtd")));

        let project_dir = std::env::var(ENV_PROJECT_DIR)
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("gtd")));

        Self {
            project_dir,
            user_dir,
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }

    fn file_for(&self, tier: ConfigTier) -> Option<PathBuf> {
        let dir = match tier {
            ConfigTier::Project => self.project_dir.as_ref(),
            ConfigTier::User => self.user_dir.as_ref(),
            ConfigTier::Defaults | ConfigTier::Environment => None,
        }?;
        Some(dir.join(CONFIG_FILE))
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Files that contributed, lowest tier first.
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit paths.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        Self::load_with(paths, |key| std::env::var(key).ok())
    }

    /// Like [`load_with`](Self::load_with), with `file` (from `--config`)
    /// taking the place of `GTD_CONFIG_PATH`.
    pub fn load_with_file(
        paths: ConfigPaths,
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file = file.map(|p| p.display().to_string());
        Self::load_with(paths, |key| match &file {
            Some(path) if key == ENV_CONFIG_PATH => Some(path.clone()),
            _ => env(key),
        })
    }

    /// Load with an injectable environment lookup.
    pub fn load_with(paths: ConfigPaths, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(explicit) = env(ENV_CONFIG_PATH) {
            let path = PathBuf::from(explicit);
            let mut config = Config::load(&path)?;
            Self::apply_env_overrides(&mut config, &env);
            return Ok(Self {
                paths,
                config,
                sources: vec![(ConfigTier::Environment, path)],
            });
        }

        let mut layers: Vec<Value> = vec![serde_json::to_value(Config::default())?];
        let mut sources = Vec::new();

        for tier in [ConfigTier::Project, ConfigTier::User] {
            let Some(file) = paths.file_for(tier) else {
                continue;
            };
            if !file.exists() {
                continue;
            }
            match read_yaml(&file) {
                Ok(value) => {
                    layers.push(value);
                    sources.push((tier, file));
                }
                Err(e) => warn!(tier = %tier, path = %file.display(), error = %e, "ignoring unreadable config"),
            }
        }

        let merged = merge_layers(layers);
        let mut config: Config = serde_json::from_value(merged)?;
        Self::apply_env_overrides(&mut config, &env);

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    fn apply_env_overrides(config: &mut Config, env: &impl Fn(&str) -> Option<String>) {
        if let Some(root) = env(ENV_ROOT) {
            config.storage.root = PathBuf::from(root);
        }

        if let Some(raw) = env(ENV_DEBOUNCE_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.storage.debounce_ms = ms,
                Err(_) => warn!(value = %raw, "ignoring non-numeric {}", ENV_DEBOUNCE_MS),
            }
        }

        if let Some(level) = env(ENV_LOG_LEVEL) {
            config.logging.level = level;
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }

    /// Highest-priority file that was read, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.sources.last().map(|(_, p)| p.as_path())
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&content)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(dir: &Path, content: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE), content).unwrap();
    }

    #[test]
    fn defaults_when_no_files() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        );
        let loader = ConfigLoader::load_with(paths, no_env).unwrap();
        assert_eq!(loader.config(), &Config::default());
        assert!(loader.config_path().is_none());
    }

    #[test]
    fn user_overrides_project_field_by_field() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("gtd");
        let user = temp.path().join("user");
        write_config(&project, "storage:\n  debounce_ms: 100\n  slug_max_len: 20\n");
        write_config(&user, "storage:\n  debounce_ms: 250\n");

        let loader =
            ConfigLoader::load_with(ConfigPaths::with_dirs(Some(project), Some(user.clone())), no_env)
                .unwrap();
        let config = loader.config();
        assert_eq!(config.storage.debounce_ms, 250);
        assert_eq!(config.storage.slug_max_len, 20);
        assert_eq!(loader.config_path(), Some(user.join(CONFIG_FILE).as_path()));
    }

    #[test]
    fn environment_wins_over_files() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("gtd");
        write_config(&project, "storage:\n  root: /from/file\n");

        let env: HashMap<&str, &str> = [
            (ENV_ROOT, "/from/env"),
            (ENV_DEBOUNCE_MS, "75"),
            (ENV_LOG_LEVEL, "debug"),
        ]
        .into_iter()
        .collect();
        let loader = ConfigLoader::load_with(ConfigPaths::with_dirs(Some(project), None), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();
        let config = loader.config();
        assert_eq!(config.storage.root, PathBuf::from("/from/env"));
        assert_eq!(config.storage.debounce_ms, 75);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn bad_debounce_env_is_ignored() {
        let loader = ConfigLoader::load_with(ConfigPaths::with_dirs(None, None), |k| {
            (k == ENV_DEBOUNCE_MS).then(|| "soon".to_string())
        })
        .unwrap();
        assert_eq!(loader.config().storage.debounce_ms, 500);
    }

    #[test]
    fn explicit_path_skips_tiers() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("gtd");
        write_config(&project, "storage:\n  slug_max_len: 10\n");
        let explicit = temp.path().join("explicit.yaml");
        std::fs::write(&explicit, "logging:\n  level: warn\n").unwrap();

        let explicit_str = explicit.display().to_string();
        let loader = ConfigLoader::load_with(ConfigPaths::with_dirs(Some(project), None), |k| {
            (k == ENV_CONFIG_PATH).then(|| explicit_str.clone())
        })
        .unwrap();
        assert_eq!(loader.config().storage.slug_max_len, 50);
        assert_eq!(loader.config().logging.level, "warn");
    }

    #[test]
    fn command_line_file_beats_env_path() {
        let temp = TempDir::new().unwrap();
        let from_env = temp.path().join("env.yaml");
        std::fs::write(&from_env, "storage:\n  root: /from/env-file\n").unwrap();
        let from_cli = temp.path().join("cli.yaml");
        std::fs::write(&from_cli, "storage:\n  root: /from/cli-file\n").unwrap();

        let env_str = from_env.display().to_string();
        let loader = ConfigLoader::load_with_file(
            ConfigPaths::with_dirs(None, None),
            Some(&from_cli),
            |k| (k == ENV_CONFIG_PATH).then(|| env_str.clone()),
        )
        .unwrap();
        assert_eq!(loader.config().storage.root, PathBuf::from("/from/cli-file"));
        assert_eq!(loader.config_path(), Some(from_cli.as_path()));

        let without_flag =
            ConfigLoader::load_with_file(ConfigPaths::with_dirs(None, None), None, |k| {
                (k == ENV_CONFIG_PATH).then(|| env_str.clone())
            })
            .unwrap();
        assert_eq!(without_flag.config().storage.root, PathBuf::from("/from/env-file"));
    }

    #[test]
    fn unreadable_tier_is_skipped() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("gtd");
        write_config(&project, "storage: [not, a, map\n");
        let loader =
            ConfigLoader::load_with(ConfigPaths::with_dirs(Some(project), None), no_env).unwrap();
        assert_eq!(loader.config(), &Config::default());
    }
}
