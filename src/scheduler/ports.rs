//! Collaborators the scheduler drives: state store, ping log, wake timer,
//! notifier and clock.

use crate::error::Result;
use crate::scheduler::state::StoredSchedule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Tag on pings that were logged but never shown to the user.
pub const TAG_OFF: &str = "OFF";

/// Tag on pings that were shown to the user. Empty until the user tags it.
pub const TAG_ANNOUNCED: &str = "";

/// A logged ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRecord {
    /// Log-assigned identifier.
    pub id: u64,
    /// Ping instant, epoch seconds.
    pub time: u64,
    /// Free-form notes. Always empty when written by the scheduler.
    #[serde(default)]
    pub notes: String,
    /// Tags. Announced pings start with the single empty tag.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl PingRecord {
    /// Whether the ping was logged without being shown.
    #[must_use]
    pub fn is_off(&self) -> bool {
        self.tags.contains(TAG_OFF)
    }
}

/// A ping about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPing {
    pub time: u64,
    pub notes: String,
    pub tags: BTreeSet<String>,
}

impl NewPing {
    /// Ping shown to the user.
    #[must_use]
    pub fn announced(time: u64) -> Self {
        Self {
            time,
            notes: String::new(),
            tags: BTreeSet::from([TAG_ANNOUNCED.to_owned()]),
        }
    }

    /// Ping logged silently with the `OFF` tag.
    #[must_use]
    pub fn off(time: u64) -> Self {
        Self {
            time,
            notes: String::new(),
            tags: BTreeSet::from([TAG_OFF.to_owned()]),
        }
    }

    /// Materialize as a record with the given id.
    #[must_use]
    pub fn into_record(self, id: u64) -> PingRecord {
        PingRecord {
            id,
            time: self.time,
            notes: self.notes,
            tags: self.tags,
        }
    }
}

/// Payload handed to the notifier for one due ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingNotice {
    /// Ping instant, epoch seconds.
    pub ping_time: u64,
    /// Whether any ping was backfilled earlier in the same wake cycle.
    pub is_backfill: bool,
    /// Id of the record logged for this ping.
    pub record_id: u64,
}

/// Durable store for the schedule scalars.
pub trait StateStore {
    /// Read the persisted state. A store with nothing saved returns the default.
    ///
    /// # Errors
    ///
    /// [`PingError::StateCorrupt`](crate::PingError::StateCorrupt) when the
    /// stored bytes cannot be read or decoded.
    fn load(&self) -> Result<StoredSchedule>;

    /// Replace the persisted state in one atomic write.
    ///
    /// # Errors
    ///
    /// [`PingError::StoreWrite`](crate::PingError::StoreWrite) on failure.
    fn commit(&mut self, state: &StoredSchedule) -> Result<()>;
}

/// Append-only ping log.
pub trait PingLog {
    /// Append a ping and return its record id.
    ///
    /// # Errors
    ///
    /// [`PingError::LogAppend`](crate::PingError::LogAppend) on failure.
    fn append(&mut self, ping: &NewPing) -> Result<u64>;

    /// Instant of the latest logged ping, if any.
    ///
    /// # Errors
    ///
    /// [`PingError::LogAppend`](crate::PingError::LogAppend) when the log
    /// cannot be read.
    fn latest_time(&mut self) -> Result<Option<u64>>;
}

/// One-shot wake timer. Arming replaces any previously armed wake.
pub trait WakeTimer {
    /// Schedule a wake at or after `at` (epoch seconds).
    ///
    /// # Errors
    ///
    /// [`PingError::TimerArm`](crate::PingError::TimerArm) on failure.
    fn arm(&mut self, at: u64) -> Result<()>;
}

/// Best-effort user notification. Failures are not reported back.
pub trait Notifier {
    fn notify(&self, notice: &PingNotice);
}

/// Wall-clock source.
pub trait Clock {
    /// Seconds since the Unix epoch.
    fn now_epoch_secs(&self) -> u64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> u64 {
        now_epoch_secs()
    }
}

/// Returns current UTC seconds since epoch.
#[must_use]
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
