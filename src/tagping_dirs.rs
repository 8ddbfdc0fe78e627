//! Centralized filesystem paths for tagping.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data (state, ping log, alarm, lock) | `~/Library/Application Support/tagping/` | `~/.local/share/tagping/` |
//! | Config | `~/Library/Application Support/tagping/` | `~/.config/tagping/` |
//!
//! # Environment Overrides
//!
//! - `TAGPING_DATA_DIR` overrides [`data_dir`]
//! - `TAGPING_CONFIG_DIR` overrides [`config_dir`]

use std::ffi::OsString;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "tagping";

fn resolve_dir(override_dir: Option<OsString>, base: Option<PathBuf>, fallback: &str) -> PathBuf {
    if let Some(dir) = override_dir {
        return PathBuf::from(dir);
    }
    base.map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(fallback))
}

/// Data root: schedule state, ping log, alarm and wake lock.
#[must_use]
pub fn data_dir() -> PathBuf {
    resolve_dir(
        std::env::var_os("TAGPING_DATA_DIR"),
        dirs::data_dir(),
        "/tmp/tagping-data",
    )
}

/// Config directory holding `config.toml`.
#[must_use]
pub fn config_dir() -> PathBuf {
    resolve_dir(
        std::env::var_os("TAGPING_CONFIG_DIR"),
        dirs::config_dir(),
        "/tmp/tagping-config",
    )
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Paths of every persisted artifact under one data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    /// Committed `next`/`previous` state.
    pub state: PathBuf,
    /// Append-only ping log.
    pub ping_log: PathBuf,
    /// Durable armed wake instant.
    pub alarm: PathBuf,
    /// Cross-process wake lock.
    pub wake_lock: PathBuf,
}

impl DataPaths {
    /// Lay out the data files under `root`.
    #[must_use]
    pub fn under(root: &Path) -> Self {
        Self {
            state: root.join("schedule.json"),
            ping_log: root.join("pings.jsonl"),
            alarm: root.join("alarm.json"),
            wake_lock: root.join("wake.lock"),
        }
    }
}
