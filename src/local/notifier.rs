//! Notifiers for running outside a desktop notification system.

use crate::scheduler::ports::{Notifier, PingNotice};
use chrono::{DateTime, Local, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Title shown for every ping.
pub const PING_TITLE: &str = "Ping!";

/// Render an epoch instant as local `yyyy.mm.dd HH:MM:SS`.
#[must_use]
pub fn format_ping_time(epoch_secs: u64) -> String {
    i64::try_from(epoch_secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y.%m.%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| format!("@{epoch_secs}"))
}

/// Announces pings through `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &PingNotice) {
        info!(
            record_id = notice.record_id,
            backfill = notice.is_backfill,
            "{PING_TITLE} {}",
            format_ping_time(notice.ping_time)
        );
    }
}

/// Forwards notices to whatever renders them.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<PingNotice>,
}

impl ChannelNotifier {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<PingNotice>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: &PingNotice) {
        if self.tx.send(*notice).is_err() {
            debug!(
                ping_time = notice.ping_time,
                "notice channel closed, dropping ping notice"
            );
        }
    }
}
