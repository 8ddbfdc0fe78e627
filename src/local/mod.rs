//! Local host glue: the file-backed collaborators, the wake lock and the
//! daemon loop that stands in for an OS alarm service.

pub mod daemon;
pub mod lock;
pub mod notifier;
pub mod timer;

pub use daemon::run;
pub use lock::{WakeGuard, WakeLock};
pub use notifier::{ChannelNotifier, TracingNotifier, format_ping_time};
pub use timer::FileWakeTimer;

use crate::config::PingConfig;
use crate::error::Result;
use crate::scheduler::ports::Notifier;
use crate::scheduler::{PingScheduler, WakeReport};
use crate::store::{JsonStateStore, JsonlPingLog};
use crate::tagping_dirs::DataPaths;

/// Scheduler wired to the files under `paths`.
pub fn open_scheduler(
    config: &PingConfig,
    paths: &DataPaths,
    notifier: impl Notifier + Send + 'static,
) -> PingScheduler {
    PingScheduler::new(
        config,
        JsonStateStore::new(paths.state.clone()),
        JsonlPingLog::new(paths.ping_log.clone()),
        FileWakeTimer::new(paths.alarm.clone()),
        notifier,
    )
}

/// Run one wake cycle while holding the wake lock.
///
/// # Errors
///
/// Returns [`PingError::Lock`](crate::PingError::Lock) if the lock cannot be
/// taken, otherwise whatever the cycle returns. The lock is released either way.
pub fn run_wake_cycle(lock: &WakeLock, scheduler: &mut PingScheduler) -> Result<WakeReport> {
    let _guard = lock.acquire()?;
    scheduler.on_wake()
}
