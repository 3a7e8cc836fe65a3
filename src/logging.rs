//! Tracing subscriber setup for the `gtd` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Where log output goes, parsed from `--log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    /// Append to a file, ANSI colors disabled.
    File(PathBuf),
}

impl LogTarget {
    /// `0`/`off`, `1`/`stdout`, `2`/`stderr`, anything else is a filename.
    pub fn parse(s: &str) -> Self {
        match s {
            "0" | "off" => LogTarget::Off,
            "1" | "stdout" => LogTarget::Stdout,
            "2" | "stderr" => LogTarget::Stderr,
            filename => LogTarget::File(PathBuf::from(filename)),
        }
    }
}

/// Filter precedence: `RUST_LOG`, then `--verbose`, then the configured level.
pub fn build_filter(verbose: bool, default_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directive = if verbose { "debug" } else { default_level };
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
pub fn init(target: &LogTarget, verbose: bool, default_level: &str) -> Result<()> {
    let filter = build_filter(verbose, default_level);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match target {
        LogTarget::Off => Ok(()),
        LogTarget::Stdout => builder
            .with_writer(std::io::stdout)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e)),
        LogTarget::Stderr => builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e)),
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            builder
                .with_writer(file)
                .with_ansi(false)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))
        }
    }
}
