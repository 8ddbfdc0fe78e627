//! In-memory collaborators for exercising the scheduler.
//!
//! Every type is a cheap clonable handle onto shared state, so a test can
//! hand one clone to [`PingScheduler`](crate::PingScheduler) and inspect the
//! other afterwards.

use crate::error::{PingError, Result};
use crate::scheduler::generator::PingGenerator;
use crate::scheduler::ports::{
    Clock, NewPing, Notifier, PingLog, PingNotice, PingRecord, StateStore, WakeTimer,
};
use crate::scheduler::state::StoredSchedule;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct StateCell {
    stored: StoredSchedule,
    commits: usize,
    fail_loads: bool,
    fail_commits: bool,
}

/// State store held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<StateCell>>,
}

impl MemoryStateStore {
    /// Preload state without counting a commit.
    pub fn seed(&self, stored: StoredSchedule) {
        lock(&self.inner).stored = stored;
    }

    /// Currently stored state.
    #[must_use]
    pub fn current(&self) -> StoredSchedule {
        lock(&self.inner).stored.clone()
    }

    /// Number of successful commits.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        lock(&self.inner).commits
    }

    /// Make loads report corrupt state.
    pub fn fail_loads(&self, fail: bool) {
        lock(&self.inner).fail_loads = fail;
    }

    /// Make commits fail.
    pub fn fail_commits(&self, fail: bool) {
        lock(&self.inner).fail_commits = fail;
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<StoredSchedule> {
        let cell = lock(&self.inner);
        if cell.fail_loads {
            return Err(PingError::StateCorrupt("injected load failure".to_owned()));
        }
        Ok(cell.stored.clone())
    }

    fn commit(&mut self, state: &StoredSchedule) -> Result<()> {
        let mut cell = lock(&self.inner);
        if cell.fail_commits {
            return Err(PingError::StoreWrite("injected commit failure".to_owned()));
        }
        cell.stored = state.clone();
        cell.commits += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LogCell {
    records: Vec<PingRecord>,
    fail_after: Option<usize>,
}

/// Ping log held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPingLog {
    inner: Arc<Mutex<LogCell>>,
}

impl MemoryPingLog {
    /// Start from existing records.
    #[must_use]
    pub fn with_records(records: Vec<PingRecord>) -> Self {
        let log = Self::default();
        lock(&log.inner).records = records;
        log
    }

    /// Logged records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<PingRecord> {
        lock(&self.inner).records.clone()
    }

    /// Fail every append once the log holds `count` records.
    pub fn fail_after(&self, count: usize) {
        lock(&self.inner).fail_after = Some(count);
    }

    /// Stop failing appends.
    pub fn heal(&self) {
        lock(&self.inner).fail_after = None;
    }
}

impl PingLog for MemoryPingLog {
    fn append(&mut self, ping: &NewPing) -> Result<u64> {
        let mut cell = lock(&self.inner);
        if cell.fail_after.is_some_and(|limit| cell.records.len() >= limit) {
            return Err(PingError::LogAppend("injected append failure".to_owned()));
        }
        let id = cell.records.last().map_or(1, |r| r.id + 1);
        cell.records.push(ping.clone().into_record(id));
        Ok(id)
    }

    fn latest_time(&mut self) -> Result<Option<u64>> {
        Ok(lock(&self.inner).records.iter().map(|r| r.time).max())
    }
}

#[derive(Debug, Default)]
struct TimerCell {
    armed: Vec<u64>,
    attempts: usize,
    failures_left: usize,
}

/// Wake timer that records every successful arm.
#[derive(Debug, Clone, Default)]
pub struct RecordingTimer {
    inner: Arc<Mutex<TimerCell>>,
}

impl RecordingTimer {
    /// Instants armed so far, in order.
    #[must_use]
    pub fn armed(&self) -> Vec<u64> {
        lock(&self.inner).armed.clone()
    }

    /// Total arm calls, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        lock(&self.inner).attempts
    }

    /// Fail the next `count` arm calls.
    pub fn fail_times(&self, count: usize) {
        lock(&self.inner).failures_left = count;
    }
}

impl WakeTimer for RecordingTimer {
    fn arm(&mut self, at: u64) -> Result<()> {
        let mut cell = lock(&self.inner);
        cell.attempts += 1;
        if cell.failures_left > 0 {
            cell.failures_left -= 1;
            return Err(PingError::TimerArm("injected arm failure".to_owned()));
        }
        cell.armed.push(at);
        Ok(())
    }
}

/// Notifier that records every notice.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<PingNotice>>>,
}

impl RecordingNotifier {
    /// Notices dispatched so far, in order.
    #[must_use]
    pub fn notices(&self) -> Vec<PingNotice> {
        lock(&self.notices).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &PingNotice) {
        lock(&self.notices).push(*notice);
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct FixedClock {
    now: Arc<AtomicU64>,
}

impl FixedClock {
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now)),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_epoch_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Generator returning a fixed sequence of instants.
///
/// Once the script runs out it falls back to `previous + mean_gap_secs`.
/// Scripted instants that would not advance past `previous` are clamped to
/// `previous + 1`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerator {
    script: VecDeque<u64>,
}

impl ScriptedGenerator {
    #[must_use]
    pub fn new(instants: impl IntoIterator<Item = u64>) -> Self {
        Self {
            script: instants.into_iter().collect(),
        }
    }
}

impl PingGenerator for ScriptedGenerator {
    fn next_instant(&mut self, previous: u64, mean_gap_secs: u64) -> u64 {
        match self.script.pop_front() {
            Some(instant) => instant.max(previous + 1),
            None => previous + mean_gap_secs.max(1),
        }
    }
}
