//! Schedule state: the persisted form and the validated in-memory form.

use crate::config::ScheduleConfig;
use crate::error::{PingError, Result};
use serde::{Deserialize, Serialize};

/// Current on-disk schema version.
pub const STATE_VERSION: u8 = 1;

fn default_state_version() -> u8 {
    STATE_VERSION
}

/// Schedule state exactly as persisted.
///
/// Fields are signed so that corrupt values survive deserialization and can
/// be rejected by [`ScheduleState::restore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSchedule {
    /// Schema version.
    #[serde(default = "default_state_version")]
    pub version: u8,
    /// Next scheduled ping (epoch seconds), if one has been drawn.
    #[serde(default)]
    pub next: Option<i64>,
    /// Most recently logged ping (epoch seconds).
    #[serde(default)]
    pub previous: Option<i64>,
}

impl Default for StoredSchedule {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            next: None,
            previous: None,
        }
    }
}

/// Where a ping instant sits relative to the wake time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingPhase {
    /// Strictly after `now`.
    Future,
    /// Due, and no more than the threshold old.
    Recent,
    /// At least the threshold old; the process was not running.
    Stale,
}

impl PingPhase {
    /// Classify `instant` against `now`. `instant == now` is due.
    #[must_use]
    pub fn classify(instant: u64, now: u64, threshold_secs: u64) -> Self {
        if instant > now {
            Self::Future
        } else if instant <= now.saturating_sub(threshold_secs) && now >= threshold_secs {
            Self::Stale
        } else {
            Self::Recent
        }
    }
}

/// Validated schedule state for one wake cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleState {
    /// Next scheduled ping; `None` until drawn.
    pub next: Option<u64>,
    /// Most recently logged ping.
    pub previous: u64,
    /// Whether due pings are announced.
    pub notify_enabled: bool,
    /// Exponential mean, seconds.
    pub mean_gap_secs: u64,
}

impl ScheduleState {
    /// A schedule that starts counting from `now`.
    #[must_use]
    pub fn fresh(config: &ScheduleConfig, now: u64) -> Self {
        Self {
            next: None,
            previous: now,
            notify_enabled: config.notify_enabled,
            mean_gap_secs: config.effective_mean_gap_secs(),
        }
    }

    /// Validate persisted fields.
    ///
    /// A missing `previous` means nothing has been logged yet, so counting
    /// starts from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`PingError::StateCorrupt`] for negative fields or a `next`
    /// earlier than `previous`.
    pub fn restore(stored: &StoredSchedule, config: &ScheduleConfig, now: u64) -> Result<Self> {
        let previous = match stored.previous {
            None => now,
            Some(p) => u64::try_from(p)
                .map_err(|_| PingError::StateCorrupt(format!("negative previous ping {p}")))?,
        };
        let next = match stored.next {
            None => None,
            Some(n) => {
                let n = u64::try_from(n)
                    .map_err(|_| PingError::StateCorrupt(format!("negative next ping {n}")))?;
                if n < previous {
                    return Err(PingError::StateCorrupt(format!(
                        "next ping {n} precedes previous ping {previous}"
                    )));
                }
                Some(n)
            }
        };

        Ok(Self {
            next,
            previous,
            notify_enabled: config.notify_enabled,
            mean_gap_secs: config.effective_mean_gap_secs(),
        })
    }

    /// Persisted form of `next` and `previous`.
    #[must_use]
    pub fn to_stored(&self) -> StoredSchedule {
        StoredSchedule {
            version: STATE_VERSION,
            next: self.next.map(saturating_i64),
            previous: Some(saturating_i64(self.previous)),
        }
    }
}

fn saturating_i64(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}
