//! Daemon loop standing in for an OS alarm service.
//!
//! Runs a wake cycle at startup, then sleeps until the instant stored in the
//! alarm file and runs the next one. Sleeps are capped so a wall-clock jump
//! (suspend, NTP correction) is noticed within a minute.

use crate::local::lock::WakeLock;
use crate::local::run_wake_cycle;
use crate::local::timer::FileWakeTimer;
use crate::scheduler::PingScheduler;
use crate::scheduler::ports::now_epoch_secs;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Longest single sleep between alarm checks (seconds).
const MAX_SLEEP_SECS: u64 = 60;

/// Pause before retrying a failed wake cycle (seconds).
const RETRY_DELAY_SECS: u64 = 5;

/// Start the daemon loop.
pub fn run(
    mut scheduler: PingScheduler,
    lock: WakeLock,
    alarm: FileWakeTimer,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("ping daemon started");

        loop {
            match run_wake_cycle(&lock, &mut scheduler) {
                Ok(report) => {
                    debug!(next = report.next, logged = report.logged.len(), "wake cycle done");
                }
                Err(e) => {
                    error!("wake cycle failed, retrying in {RETRY_DELAY_SECS}s: {e}");
                    tokio::time::sleep(Duration::from_secs(RETRY_DELAY_SECS)).await;
                    continue;
                }
            }

            loop {
                let delay = match alarm.armed_at() {
                    Ok(Some(at)) => at.saturating_sub(now_epoch_secs()),
                    Ok(None) => 0,
                    Err(e) => {
                        warn!("cannot read alarm, waking now: {e}");
                        0
                    }
                };
                if delay == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(delay.min(MAX_SLEEP_SECS))).await;
            }
        }
    })
}
