//! tagping: a stochastic self-scheduling pinger.
//!
//! Pings arrive at exponentially distributed intervals. Each time the
//! process is woken (its alarm fires, it starts, or it is triggered by
//! hand) the scheduler works out which pings came due since it last ran:
//! the long-overdue ones are logged silently as `OFF`, recent ones are
//! logged and announced, and exactly one alarm is armed for the next ping.
//!
//! # Architecture
//!
//! - **scheduler**: the random process and the catch-up cycle, written
//!   against small collaborator traits
//! - **store**: JSON state file and JSONL ping log
//! - **local**: wake lock, durable alarm file, notifiers and the daemon loop

pub mod config;
pub mod error;
pub mod local;
pub mod scheduler;
pub mod store;
pub mod tagping_dirs;
#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub mod test_utils;

pub use config::PingConfig;
pub use error::{PingError, Result};
pub use scheduler::{PingScheduler, WakeReport};
