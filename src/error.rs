//! Error types for the ping scheduler.

/// Top-level error type for tagping.
#[derive(Debug, thiserror::Error)]
pub enum PingError {
    /// Persisted schedule state is unreadable or semantically invalid.
    ///
    /// The scheduler recovers from this by starting fresh; it only escapes
    /// from store-level helpers that callers may want to inspect directly.
    #[error("schedule state corrupt: {0}")]
    StateCorrupt(String),

    /// Committing schedule state failed.
    #[error("state write failed: {0}")]
    StoreWrite(String),

    /// Appending to or reading the ping log failed.
    #[error("ping log error: {0}")]
    LogAppend(String),

    /// Arming the wake timer failed after all retries.
    #[error("timer arm failed: {0}")]
    TimerArm(String),

    /// Wake lock acquisition failed.
    #[error("wake lock error: {0}")]
    Lock(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PingError>;
