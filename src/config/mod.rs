//! Tiered configuration.
//!
//! Consolidates configuration from four tiers with field-by-field merging:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/gtd/config.yaml`
//! 3. **User** - `~/.gtd/config.yaml`
//! 4. **Environment** - variables below
//!
//! ## Environment Variables
//! - `GTD_CONFIG_PATH` - Explicit config file (overrides all tiers)
//! - `GTD_ROOT` - Store root directory
//! - `GTD_DEBOUNCE_MS` - Write debounce interval
//! - `GTD_LOG_LEVEL` - Default log filter
//! - `GTD_USER_DIR` - User config dir (default: `~/.gtd`)
//! - `GTD_PROJECT_DIR` - Project config dir (default: `./gtd`)

mod loader;
mod merge;
mod types;

pub use loader::{
    ConfigLoader, ConfigPaths, ConfigTier, ENV_CONFIG_PATH, ENV_DEBOUNCE_MS, ENV_LOG_LEVEL,
    ENV_ROOT,
};
pub use merge::{merge_into, merge_layers};
pub use types::*;
