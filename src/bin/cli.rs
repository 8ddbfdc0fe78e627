//! CLI binary for tagping.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tagping::PingConfig;
use tagping::local::{
    FileWakeTimer, TracingNotifier, WakeLock, format_ping_time, open_scheduler, run_wake_cycle,
};
use tagping::scheduler::StateStore;
use tagping::store::{JsonStateStore, JsonlPingLog};
use tagping::tagping_dirs::{DataPaths, data_dir};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// tagping: random pings at exponentially distributed times.
#[derive(Parser)]
#[command(name = "tagping", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for schedule state, ping log and alarm.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run one wake cycle now and exit.
    Wake,

    /// Keep running, waking whenever the alarm is due.
    Daemon,

    /// Show the committed schedule and the pending alarm.
    Status,

    /// Print the most recent pings.
    Log {
        /// Number of pings to show.
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tagping=info")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(PingConfig::default_config_path);
    let config = PingConfig::load_or_default(&config_path)?;
    let paths = DataPaths::under(&cli.data_dir.unwrap_or_else(data_dir));

    match cli.command.unwrap_or(Command::Wake) {
        Command::Wake => wake(&config, &paths),
        Command::Daemon => daemon(&config, &paths).await,
        Command::Status => status(&config, &paths),
        Command::Log { limit } => print_log(&paths, limit),
    }
}

fn wake(config: &PingConfig, paths: &DataPaths) -> anyhow::Result<()> {
    let mut scheduler = open_scheduler(config, paths, TracingNotifier);
    let lock = WakeLock::new(paths.wake_lock.clone(), &config.lock);
    let report = run_wake_cycle(&lock, &mut scheduler)?;

    println!(
        "logged {} ping(s), announced {}; next ping at {}",
        report.logged.len(),
        report.announced(),
        format_ping_time(report.next)
    );
    Ok(())
}

async fn daemon(config: &PingConfig, paths: &DataPaths) -> anyhow::Result<()> {
    let scheduler = open_scheduler(config, paths, TracingNotifier);
    let lock = WakeLock::new(paths.wake_lock.clone(), &config.lock);
    let handle = tagping::local::run(scheduler, lock, FileWakeTimer::new(paths.alarm.clone()));

    tokio::select! {
        joined = handle => {
            joined.map_err(|e| anyhow::anyhow!("daemon task ended: {e}"))?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutting down");
        }
    }
    Ok(())
}

fn status(config: &PingConfig, paths: &DataPaths) -> anyhow::Result<()> {
    let stored = JsonStateStore::new(paths.state.clone()).load()?;
    let alarm = FileWakeTimer::new(paths.alarm.clone()).armed_at()?;
    let show = |secs: Option<i64>| match secs.and_then(|s| u64::try_from(s).ok()) {
        Some(s) => format!("{} ({s})", format_ping_time(s)),
        None => "unset".to_owned(),
    };

    println!("next ping:      {}", show(stored.next));
    println!("previous ping:  {}", show(stored.previous));
    println!(
        "alarm:          {}",
        show(alarm.and_then(|a| i64::try_from(a).ok()))
    );
    println!("mean gap:       {}s", config.schedule.effective_mean_gap_secs());
    println!("notifications:  {}", if config.schedule.notify_enabled { "on" } else { "off" });
    if config.schedule.debug {
        println!("debug mode:     fixed {}s gap", config.schedule.debug_gap_secs);
    }
    Ok(())
}

fn print_log(paths: &DataPaths, limit: usize) -> anyhow::Result<()> {
    let log = JsonlPingLog::new(paths.ping_log.clone());
    for record in log.recent(limit)? {
        let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
        println!(
            "{:>6}  {}  {}  {}",
            record.id,
            format_ping_time(record.time),
            tags.join(" "),
            record.notes
        );
    }
    Ok(())
}
