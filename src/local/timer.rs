//! Durable wake timer backed by a small JSON file.
//!
//! Only one wake is ever pending: arming overwrites the file. The daemon
//! reads it back to know when to run the next cycle, and because it lives
//! on disk the schedule survives restarts.

use crate::error::{PingError, Result};
use crate::scheduler::ports::{WakeTimer, now_epoch_secs};
use crate::store::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AlarmRecord {
    /// Wake instant, epoch seconds.
    armed_at: u64,
    /// When the alarm was set.
    set_at: u64,
}

/// Wake timer persisted to `alarm.json`.
#[derive(Debug, Clone)]
pub struct FileWakeTimer {
    path: PathBuf,
}

impl FileWakeTimer {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The pending wake instant, if any.
    ///
    /// A malformed alarm file reads as "no alarm" so the host wakes
    /// immediately and re-arms.
    ///
    /// # Errors
    ///
    /// Returns [`PingError::TimerArm`] if the file exists but cannot be read.
    pub fn armed_at(&self) -> Result<Option<u64>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PingError::TimerArm(format!("cannot read alarm: {e}")));
            }
        };

        match serde_json::from_slice::<AlarmRecord>(&bytes) {
            Ok(record) => Ok(Some(record.armed_at)),
            Err(e) => {
                tracing::warn!("ignoring malformed alarm at {}: {e}", self.path.display());
                Ok(None)
            }
        }
    }
}

impl WakeTimer for FileWakeTimer {
    fn arm(&mut self, at: u64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PingError::TimerArm(format!("cannot create alarm directory: {e}")))?;
        }

        let record = AlarmRecord {
            armed_at: at,
            set_at: now_epoch_secs(),
        };
        let json = serde_json::to_vec(&record)
            .map_err(|e| PingError::TimerArm(format!("cannot serialize alarm: {e}")))?;

        write_atomic(&self.path, &json)
            .map_err(|e| PingError::TimerArm(format!("cannot write alarm file: {e}")))?;
        Ok(())
    }
}
