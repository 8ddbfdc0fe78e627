//! Cross-process wake lock.
//!
//! A wake cycle reads, modifies and writes persisted state, so only one may
//! run at a time. The lock is a file created with `create_new`; holding the
//! returned [`WakeGuard`] means holding the lock, and dropping it releases
//! the lock on every exit path. While held, the guard refreshes the file's
//! mtime so a long catch-up is never mistaken for an abandoned lock.

use crate::config::LockConfig;
use crate::error::{PingError, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};

/// Shortest interval between lock refreshes.
const MIN_HEARTBEAT: Duration = Duration::from_millis(50);

/// File-backed mutual exclusion for wake cycles.
#[derive(Debug, Clone)]
pub struct WakeLock {
    path: PathBuf,
    timeout: Duration,
    stale_after: Duration,
}

impl WakeLock {
    #[must_use]
    pub fn new(path: PathBuf, config: &LockConfig) -> Self {
        Self {
            path,
            timeout: Duration::from_millis(config.timeout_ms),
            stale_after: Duration::from_secs(config.stale_after_secs),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the lock is free or the timeout passes.
    ///
    /// # Errors
    ///
    /// Returns [`PingError::Lock`] on timeout or when the lock file cannot
    /// be created.
    pub fn acquire(&self) -> Result<WakeGuard> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PingError::Lock(format!("cannot create wake lock directory: {e}")))?;
        }

        let started = Instant::now();
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
            {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(WakeGuard {
                        path: self.path.clone(),
                        heartbeat: Some(Heartbeat::start(
                            self.path.clone(),
                            (self.stale_after / 3).max(MIN_HEARTBEAT),
                        )),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    self.evict_stale_lock();
                    if started.elapsed() > self.timeout {
                        return Err(PingError::Lock(format!(
                            "timed out waiting for wake lock {}",
                            self.path.display()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(2));
                }
                Err(e) => {
                    return Err(PingError::Lock(format!(
                        "cannot create wake lock {}: {e}",
                        self.path.display()
                    )));
                }
            }
        }
    }

    /// Remove a lock left behind by a process that died mid-cycle.
    fn evict_stale_lock(&self) {
        let Ok(metadata) = std::fs::metadata(&self.path) else {
            return;
        };
        let Ok(modified) = metadata.modified() else {
            return;
        };
        let Ok(age) = SystemTime::now().duration_since(modified) else {
            return;
        };

        if age > self.stale_after {
            tracing::warn!(
                "evicting stale wake lock {} ({}s old)",
                self.path.display(),
                age.as_secs()
            );
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Held wake lock; released on drop.
#[derive(Debug)]
pub struct WakeGuard {
    path: PathBuf,
    heartbeat: Option<Heartbeat>,
}

impl Drop for WakeGuard {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Background thread that keeps a held lock file fresh.
#[derive(Debug)]
struct Heartbeat {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    fn start(path: PathBuf, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            while let Err(mpsc::RecvTimeoutError::Timeout) = stop_rx.recv_timeout(interval) {
                let touched = OpenOptions::new()
                    .write(true)
                    .open(&path)
                    .and_then(|file| file.set_modified(SystemTime::now()));
                if let Err(e) = touched {
                    tracing::debug!("cannot refresh wake lock {}: {e}", path.display());
                }
            }
        });
        Self { stop_tx, handle }
    }

    fn stop(self) {
        drop(self.stop_tx);
        let _ = self.handle.join();
    }
}
