//! Integration tests: wake cycles over the file-backed state store, ping log,
//! alarm and wake lock.

use tagping::PingConfig;
use tagping::local::{FileWakeTimer, WakeLock, run_wake_cycle};
use tagping::scheduler::{
    FixedGapGenerator, PingScheduler, StateStore, StoredSchedule, TAG_ANNOUNCED, WakeOutcome,
};
use tagping::store::{JsonStateStore, JsonlPingLog};
use tagping::tagping_dirs::DataPaths;
use tagping::test_utils::{FixedClock, RecordingNotifier};

/// Scheduler over the files in `paths`, using the generator `config` selects.
fn configured_scheduler(
    config: &PingConfig,
    paths: &DataPaths,
    clock: &FixedClock,
    notifier: &RecordingNotifier,
) -> PingScheduler {
    PingScheduler::new(
        config,
        JsonStateStore::new(paths.state.clone()),
        JsonlPingLog::new(paths.ping_log.clone()),
        FileWakeTimer::new(paths.alarm.clone()),
        notifier.clone(),
    )
    .with_clock(clock.clone())
}

fn file_scheduler(
    config: &PingConfig,
    paths: &DataPaths,
    clock: &FixedClock,
    notifier: &RecordingNotifier,
) -> PingScheduler {
    configured_scheduler(config, paths, clock, notifier).with_generator(FixedGapGenerator::new(600))
}

fn seed_state(paths: &DataPaths, next: u64, previous: u64) {
    JsonStateStore::new(paths.state.clone())
        .commit(&StoredSchedule {
            next: Some(i64::try_from(next).expect("next fits i64")),
            previous: Some(i64::try_from(previous).expect("previous fits i64")),
            ..StoredSchedule::default()
        })
        .expect("seed state");
}

#[test]
fn fresh_install_arms_first_ping_from_now() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = DataPaths::under(dir.path());
    let clock = FixedClock::new(1_700_000_000);
    let notifier = RecordingNotifier::default();
    let config = PingConfig::default();
    let mut scheduler = file_scheduler(&config, &paths, &clock, &notifier);
    let lock = WakeLock::new(paths.wake_lock.clone(), &config.lock);

    let report = run_wake_cycle(&lock, &mut scheduler).expect("wake");

    assert_eq!(report.next, 1_700_000_600);
    assert!(report.logged.is_empty());
    let alarm = FileWakeTimer::new(paths.alarm.clone());
    assert_eq!(alarm.armed_at().expect("alarm"), Some(1_700_000_600));
    assert!(!paths.wake_lock.exists(), "lock released after the cycle");
}

#[test]
fn device_off_for_hours_backfills_then_announces() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = DataPaths::under(dir.path());
    let start = 1_700_000_000;
    seed_state(&paths, start + 600, start);

    // Asleep for three hours, waking 20s after a ping was due.
    let clock = FixedClock::new(start + 3 * 3600 + 20);
    let notifier = RecordingNotifier::default();
    let config = PingConfig::default();
    let mut scheduler = file_scheduler(&config, &paths, &clock, &notifier);
    let lock = WakeLock::new(paths.wake_lock.clone(), &config.lock);

    let report = run_wake_cycle(&lock, &mut scheduler).expect("wake");

    let records = JsonlPingLog::new(paths.ping_log.clone())
        .read_all()
        .expect("read log");
    assert_eq!(records.len(), 18);
    assert!(records[..17].iter().all(|r| r.is_off()));
    assert!(!records[17].is_off());
    assert_eq!(records[17].time, start + 3 * 3600);

    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].is_backfill);
    assert_eq!(notices[0].record_id, records[17].id);
    assert_eq!(report.next, start + 3 * 3600 + 600);

    // Nothing left to do until the alarm.
    clock.advance(30);
    let again = run_wake_cycle(&lock, &mut scheduler).expect("second wake");
    assert_eq!(again.outcome, WakeOutcome::FastPath);
    assert_eq!(
        JsonlPingLog::new(paths.ping_log.clone())
            .read_all()
            .expect("read log")
            .len(),
        18
    );
}

#[test]
fn crash_before_commit_is_resumed_without_double_logging() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = DataPaths::under(dir.path());
    let start = 1_700_000_000;
    seed_state(&paths, start + 600, start);
    let before = std::fs::read(&paths.state).expect("state bytes");

    let clock = FixedClock::new(start + 6000);
    let notifier = RecordingNotifier::default();
    let config = PingConfig::default();

    let mut first = file_scheduler(&config, &paths, &clock, &notifier);
    first.on_wake().expect("wake");
    let full_log = std::fs::read_to_string(&paths.ping_log).expect("log");
    let committed = std::fs::read(&paths.state).expect("state bytes");

    // Pretend the process died after four appends: state never committed.
    let partial: String = full_log.lines().take(4).map(|l| format!("{l}\n")).collect();
    std::fs::write(&paths.ping_log, partial).expect("truncate log");
    std::fs::write(&paths.state, &before).expect("restore state");
    std::fs::remove_file(&paths.alarm).expect("drop alarm");

    let mut resumed = file_scheduler(&config, &paths, &clock, &notifier);
    resumed.on_wake().expect("resumed wake");

    assert_eq!(
        std::fs::read_to_string(&paths.ping_log).expect("log"),
        full_log
    );
    assert_eq!(std::fs::read(&paths.state).expect("state bytes"), committed);
    assert_eq!(
        FileWakeTimer::new(paths.alarm.clone())
            .armed_at()
            .expect("alarm"),
        Some(start + 6600)
    );
}

#[test]
fn corrupt_state_file_restarts_from_now() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = DataPaths::under(dir.path());
    std::fs::write(&paths.state, b"\x00\x01 definitely not json").expect("write garbage");

    let clock = FixedClock::new(1_700_000_000);
    let notifier = RecordingNotifier::default();
    let mut scheduler = file_scheduler(&PingConfig::default(), &paths, &clock, &notifier);

    let report = scheduler.on_wake().expect("wake");

    assert!(report.recovered);
    assert_eq!(report.next, 1_700_000_600);
    let stored = JsonStateStore::new(paths.state.clone())
        .load()
        .expect("state readable again");
    assert_eq!(stored.previous, Some(1_700_000_000));
}

#[test]
fn held_lock_blocks_a_concurrent_cycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = DataPaths::under(dir.path());
    let mut config = PingConfig::default();
    config.lock.timeout_ms = 20;
    let clock = FixedClock::new(1_700_000_000);
    let notifier = RecordingNotifier::default();
    let mut scheduler = file_scheduler(&config, &paths, &clock, &notifier);
    let lock = WakeLock::new(paths.wake_lock.clone(), &config.lock);

    let guard = lock.acquire().expect("first holder");
    assert!(matches!(
        run_wake_cycle(&lock, &mut scheduler),
        Err(tagping::PingError::Lock(_))
    ));
    assert!(!paths.state.exists(), "blocked cycle must not touch state");

    drop(guard);
    assert!(run_wake_cycle(&lock, &mut scheduler).is_ok());
}

#[test]
fn power_loss_mid_append_does_not_swallow_the_next_ping() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = DataPaths::under(dir.path());
    let start = 1_700_000_000;
    seed_state(&paths, start + 600, start);
    let torn = format!(
        "{{\"id\":1,\"time\":{start},\"notes\":\"\",\"tags\":[\"OFF\"]}}\n{{\"id\":2,\"ti"
    );
    std::fs::write(&paths.ping_log, torn).expect("torn log");

    let clock = FixedClock::new(start + 620);
    let notifier = RecordingNotifier::default();
    let mut scheduler = file_scheduler(&PingConfig::default(), &paths, &clock, &notifier);

    scheduler.on_wake().expect("wake");

    let records = JsonlPingLog::new(paths.ping_log.clone())
        .read_all()
        .expect("read log");
    assert_eq!(
        records.iter().map(|r| r.time).collect::<Vec<_>>(),
        vec![start, start + 600]
    );
    assert!(records[1].tags.contains(TAG_ANNOUNCED));
    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].record_id, records[1].id);
}

#[test]
fn debug_config_file_gives_fixed_sixty_second_pings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = DataPaths::under(dir.path());
    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, "[schedule]\ndebug = true\n").expect("write config");
    let config = PingConfig::from_file(&config_path).expect("config");

    let start = 1_700_000_000;
    seed_state(&paths, start + 60, start);
    let clock = FixedClock::new(start + 150);
    let notifier = RecordingNotifier::default();
    let mut scheduler = configured_scheduler(&config, &paths, &clock, &notifier);

    let report = scheduler.on_wake().expect("wake");

    // start+60 is 90s old, start+120 is 30s old.
    let records = JsonlPingLog::new(paths.ping_log.clone())
        .read_all()
        .expect("read log");
    assert_eq!(
        records.iter().map(|r| r.time).collect::<Vec<_>>(),
        vec![start + 60, start + 120]
    );
    assert!(records[0].is_off());
    assert!(!records[1].is_off());
    assert_eq!(report.next, start + 180);
    assert_eq!(
        FileWakeTimer::new(paths.alarm.clone())
            .armed_at()
            .expect("alarm"),
        Some(start + 180)
    );

    clock.advance(40);
    let again = scheduler.on_wake().expect("second wake");
    assert_eq!(again.next, start + 240);
    assert_eq!(notifier.notices().len(), 2);
}
