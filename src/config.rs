//! Configuration types for the ping scheduler.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default mean gap between pings: 45 minutes.
pub const DEFAULT_MEAN_GAP_SECS: u64 = 45 * 60;

/// Overdue pings older than this many seconds are backfilled silently.
pub const DEFAULT_RETRO_THRESHOLD_SECS: u64 = 60;

/// Fixed gap used when deterministic debug mode is on.
pub const DEFAULT_DEBUG_GAP_SECS: u64 = 60;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    /// Random process and notification settings.
    pub schedule: ScheduleConfig,
    /// Wake timer settings.
    pub timer: TimerConfig,
    /// Cross-process wake lock settings.
    pub lock: LockConfig,
}

/// Random process and notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Mean of the exponential inter-ping distribution, in seconds.
    ///
    /// A value of 0 is invalid and is replaced by [`DEFAULT_MEAN_GAP_SECS`].
    pub mean_gap_secs: u64,
    /// Overdue pings at least this old are logged with the `OFF` tag and
    /// never announced.
    pub retro_threshold_secs: u64,
    /// Whether pings are announced to the user. When off, pings are still
    /// logged, tagged `OFF`.
    pub notify_enabled: bool,
    /// Replace the random process with a fixed gap. Testing only.
    pub debug: bool,
    /// Gap used while `debug` is set.
    pub debug_gap_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            mean_gap_secs: DEFAULT_MEAN_GAP_SECS,
            retro_threshold_secs: DEFAULT_RETRO_THRESHOLD_SECS,
            notify_enabled: true,
            debug: false,
            debug_gap_secs: DEFAULT_DEBUG_GAP_SECS,
        }
    }
}

impl ScheduleConfig {
    /// Mean gap to use, falling back to the default for an invalid value.
    pub fn effective_mean_gap_secs(&self) -> u64 {
        if self.mean_gap_secs == 0 {
            tracing::warn!(
                "invalid mean_gap_secs 0, using default {}",
                DEFAULT_MEAN_GAP_SECS
            );
            return DEFAULT_MEAN_GAP_SECS;
        }
        self.mean_gap_secs
    }
}

/// Wake timer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// How many times to try arming the timer before failing the cycle.
    pub arm_attempts: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { arm_attempts: 3 }
    }
}

/// Cross-process wake lock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// How long to wait for another wake cycle to finish.
    pub timeout_ms: u64,
    /// Lock files older than this are considered abandoned.
    pub stale_after_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1500,
            stale_after_secs: 30,
        }
    }
}

impl PingConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::PingError::Config(e.to_string()))
    }

    /// Load from `path` if it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &std::path::Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::PingError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path (`config_dir()/config.toml`).
    pub fn default_config_path() -> PathBuf {
        crate::tagping_dirs::config_file()
    }
}
