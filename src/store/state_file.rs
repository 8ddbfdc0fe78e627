//! JSON file holding the committed schedule state.

use crate::error::{PingError, Result};
use crate::scheduler::ports::StateStore;
use crate::scheduler::state::StoredSchedule;
use crate::store::write_atomic;
use std::path::{Path, PathBuf};

/// State store backed by a single JSON file, replaced atomically on commit.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<StoredSchedule> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoredSchedule::default());
            }
            Err(e) => {
                return Err(PingError::StateCorrupt(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            PingError::StateCorrupt(format!("cannot parse {}: {e}", self.path.display()))
        })
    }

    fn commit(&mut self, state: &StoredSchedule) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PingError::StoreWrite(format!("cannot create state dir: {e}")))?;
        }

        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| PingError::StoreWrite(format!("cannot serialize state: {e}")))?;

        // Write-then-rename so `next` and `previous` never land separately.
        write_atomic(&self.path, &json)
            .map_err(|e| PingError::StoreWrite(format!("cannot write state file: {e}")))?;
        Ok(())
    }
}
