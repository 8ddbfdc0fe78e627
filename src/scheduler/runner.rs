//! The wake cycle.
//!
//! [`PingScheduler::on_wake`] is the only entry point. Each call reconciles
//! the stored `next` ping against the wall clock, logs every ping that came
//! due while nothing was watching, announces the recent ones, commits the
//! new state once and arms exactly one wake timer for the next ping.
//!
//! Callers must serialize wakes (see [`crate::local::WakeLock`]); the cycle
//! reads, modifies and writes persisted state with no locking of its own.

use crate::config::{PingConfig, ScheduleConfig};
use crate::error::{PingError, Result};
use crate::scheduler::generator::{PingGenerator, generator_for};
use crate::scheduler::ports::{
    Clock, NewPing, Notifier, PingLog, PingNotice, StateStore, SystemClock, WakeTimer,
};
use crate::scheduler::state::{PingPhase, ScheduleState};
use tracing::{debug, error, info, warn};

/// How a logged ping was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingDisposition {
    /// Overdue past the threshold; logged `OFF`, never shown.
    Backfilled,
    /// Recent; logged and announced.
    Announced,
    /// Recent, but notifications are off; logged `OFF`.
    Silenced,
}

/// One ping logged during a wake cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedPing {
    pub record_id: u64,
    pub time: u64,
    pub disposition: PingDisposition,
}

/// Whether the cycle had any work to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// The stored next ping was still in the future; nothing written.
    FastPath,
    /// Pings were drained and/or a new next ping was committed.
    CaughtUp,
}

/// Summary of one wake cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeReport {
    /// Wall-clock time captured at the start of the cycle.
    pub now: u64,
    pub outcome: WakeOutcome,
    /// Pings logged this cycle, oldest first.
    pub logged: Vec<LoggedPing>,
    /// The next ping, for which the timer is armed.
    pub next: u64,
    /// Whether stored state was unusable and the schedule restarted from `now`.
    pub recovered: bool,
}

impl WakeReport {
    /// Number of notifications dispatched.
    #[must_use]
    pub fn announced(&self) -> usize {
        self.count(PingDisposition::Announced)
    }

    /// Number of pings logged silently because they were stale.
    #[must_use]
    pub fn backfilled(&self) -> usize {
        self.count(PingDisposition::Backfilled)
    }

    fn count(&self, disposition: PingDisposition) -> usize {
        self.logged
            .iter()
            .filter(|p| p.disposition == disposition)
            .count()
    }
}

/// Reactive ping scheduler.
pub struct PingScheduler {
    /// Random process and notification settings.
    config: ScheduleConfig,
    /// Attempts allowed when arming the wake timer.
    arm_attempts: u32,
    store: Box<dyn StateStore + Send>,
    log: Box<dyn PingLog + Send>,
    timer: Box<dyn WakeTimer + Send>,
    notifier: Box<dyn Notifier + Send>,
    clock: Box<dyn Clock + Send>,
    generator: Box<dyn PingGenerator + Send>,
}

impl PingScheduler {
    /// Create a scheduler over the given collaborators, using the system
    /// clock and the generator selected by `config`.
    pub fn new(
        config: &PingConfig,
        store: impl StateStore + Send + 'static,
        log: impl PingLog + Send + 'static,
        timer: impl WakeTimer + Send + 'static,
        notifier: impl Notifier + Send + 'static,
    ) -> Self {
        Self {
            config: config.schedule.clone(),
            arm_attempts: config.timer.arm_attempts.max(1),
            store: Box::new(store),
            log: Box::new(log),
            timer: Box::new(timer),
            notifier: Box::new(notifier),
            clock: Box::new(SystemClock),
            generator: generator_for(&config.schedule),
        }
    }

    /// Replace the wall-clock source.
    pub fn with_clock(mut self, clock: impl Clock + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replace the next-ping generator.
    pub fn with_generator(mut self, generator: impl PingGenerator + Send + 'static) -> Self {
        self.generator = Box::new(generator);
        self
    }

    /// Schedule settings in effect.
    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Run one wake cycle.
    ///
    /// # Errors
    ///
    /// Fails without arming a timer when appending a ping or committing state
    /// fails; the caller should retry the whole wake. Fails with
    /// [`PingError::TimerArm`] when every arm attempt fails, after state has
    /// been committed.
    pub fn on_wake(&mut self) -> Result<WakeReport> {
        let now = self.clock.now_epoch_secs();
        let (mut state, recovered) = self.load_state(now);

        if let Some(next) = state.next.filter(|&next| next > now) {
            debug!(next, now, "next ping still in the future");
            self.arm_timer(next)?;
            return Ok(WakeReport {
                now,
                outcome: WakeOutcome::FastPath,
                logged: Vec::new(),
                next,
                recovered,
            });
        }

        self.reconcile_with_log(&mut state)?;

        let mut next = match state.next {
            Some(next) => next,
            None => self.draw_after(&state),
        };
        let mut logged = Vec::new();
        let mut backfilled = false;

        // Classification is redone for every instant against the one `now`
        // captured above, so a cycle's decisions stay consistent.
        loop {
            let phase = PingPhase::classify(next, now, self.config.retro_threshold_secs);
            let ping = match phase {
                PingPhase::Future => break,
                PingPhase::Stale => {
                    backfilled = true;
                    self.record(NewPing::off(next), PingDisposition::Backfilled)?
                }
                PingPhase::Recent if state.notify_enabled => {
                    let ping = self.record(NewPing::announced(next), PingDisposition::Announced)?;
                    self.notifier.notify(&PingNotice {
                        ping_time: next,
                        is_backfill: backfilled,
                        record_id: ping.record_id,
                    });
                    ping
                }
                PingPhase::Recent => self.record(NewPing::off(next), PingDisposition::Silenced)?,
            };
            logged.push(ping);

            state.previous = next;
            next = self.draw_after(&state);
        }

        state.next = Some(next);
        self.store.commit(&state.to_stored())?;

        let report = WakeReport {
            now,
            outcome: WakeOutcome::CaughtUp,
            logged,
            next,
            recovered,
        };
        info!(
            logged = report.logged.len(),
            backfilled = report.backfilled(),
            announced = report.announced(),
            next,
            "wake cycle caught up"
        );

        self.arm_timer(next)?;
        Ok(report)
    }

    /// Load and validate state, starting fresh from `now` when it is unusable.
    fn load_state(&self, now: u64) -> (ScheduleState, bool) {
        let restored = self
            .store
            .load()
            .and_then(|stored| ScheduleState::restore(&stored, &self.config, now));

        match restored {
            Ok(state) => (state, false),
            Err(e) => {
                warn!("schedule state unusable, restarting from now: {e}");
                (ScheduleState::fresh(&self.config, now), true)
            }
        }
    }

    /// Catch up with pings a previous cycle logged but never committed.
    fn reconcile_with_log(&mut self, state: &mut ScheduleState) -> Result<()> {
        let Some(latest) = self.log.latest_time()? else {
            return Ok(());
        };

        if latest > state.previous {
            debug!(
                latest,
                previous = state.previous,
                "ping log is ahead of committed state"
            );
            state.previous = latest;
        }
        if state.next.is_some_and(|next| next <= latest) {
            warn!(
                latest,
                "discarding stored next ping already present in the log"
            );
            state.next = None;
        }
        Ok(())
    }

    fn draw_after(&mut self, state: &ScheduleState) -> u64 {
        self.generator
            .next_instant(state.previous, state.mean_gap_secs)
    }

    fn record(&mut self, ping: NewPing, disposition: PingDisposition) -> Result<LoggedPing> {
        let time = ping.time;
        let record_id = self.log.append(&ping)?;
        debug!(record_id, time, ?disposition, "logged ping");
        Ok(LoggedPing {
            record_id,
            time,
            disposition,
        })
    }

    /// Arm the wake timer, retrying before giving up on the cycle.
    fn arm_timer(&mut self, at: u64) -> Result<()> {
        let mut last_error = None;
        for attempt in 1..=self.arm_attempts {
            match self.timer.arm(at) {
                Ok(()) => {
                    debug!(at, "wake timer armed");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, attempts = self.arm_attempts, "cannot arm wake timer: {e}");
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error.map_or_else(|| "no attempts made".to_owned(), |e| e.to_string());
        error!(
            at,
            "wake timer not armed; pings stall until the next manual wake: {reason}"
        );
        Err(PingError::TimerArm(format!(
            "{} attempts failed for {at}: {reason}",
            self.arm_attempts
        )))
    }
}
