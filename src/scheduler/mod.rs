//! Stochastic ping scheduling.
//!
//! Pings arrive as a Poisson process. The scheduler is purely reactive: an
//! external wake (timer fire, process start, manual trigger) calls
//! [`PingScheduler::on_wake`], which catches up with every ping that came
//! due, commits the new state and arms the next wake.

pub mod generator;
pub mod ports;
pub mod runner;
pub mod state;

pub use generator::{ExponentialGenerator, FixedGapGenerator, PingGenerator};
pub use ports::{
    Clock, NewPing, Notifier, PingLog, PingNotice, PingRecord, StateStore, SystemClock,
    TAG_ANNOUNCED, TAG_OFF, WakeTimer,
};
pub use runner::{LoggedPing, PingDisposition, PingScheduler, WakeOutcome, WakeReport};
pub use state::{PingPhase, ScheduleState, StoredSchedule};
