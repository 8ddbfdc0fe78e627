//! Append-only JSONL ping log.

use crate::error::{PingError, Result};
use crate::scheduler::ports::{NewPing, PingLog, PingRecord};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Highest id and latest instant seen in the file.
#[derive(Debug, Clone, Copy, Default)]
struct LogTail {
    last_id: u64,
    latest_time: Option<u64>,
}

/// Ping log stored as one JSON record per line.
#[derive(Debug)]
pub struct JsonlPingLog {
    path: PathBuf,
    tail: Option<LogTail>,
}

impl JsonlPingLog {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, tail: None }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every readable record, in file order. Malformed lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PingError::LogAppend`] if the file exists but cannot be read.
    pub fn read_all(&self) -> Result<Vec<PingRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PingError::LogAppend(format!("cannot read ping log: {e}")));
            }
        };

        let mut records = Vec::new();
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<PingRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        "ignoring malformed ping log line in {}: {e}",
                        self.path.display()
                    );
                }
            }
        }
        Ok(records)
    }

    /// The `limit` most recent records, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`PingError::LogAppend`] if the file cannot be read.
    pub fn recent(&self, limit: usize) -> Result<Vec<PingRecord>> {
        let mut records = self.read_all()?;
        let drop_count = records.len().saturating_sub(limit);
        records.drain(0..drop_count);
        Ok(records)
    }

    fn tail(&mut self) -> Result<LogTail> {
        if let Some(tail) = self.tail {
            return Ok(tail);
        }
        self.drop_torn_tail()?;
        let tail = self.read_all()?.iter().fold(LogTail::default(), |tail, r| LogTail {
            last_id: tail.last_id.max(r.id),
            latest_time: tail.latest_time.max(Some(r.time)),
        });
        self.tail = Some(tail);
        Ok(tail)
    }

    /// Cut off a final line left without its newline by an interrupted append.
    ///
    /// Appending after such a fragment would glue the new record onto it and
    /// make both unreadable.
    fn drop_torn_tail(&self) -> Result<()> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(PingError::LogAppend(format!("cannot read ping log: {e}")));
            }
        };
        if bytes.last().is_none_or(|&b| b == b'\n') {
            return Ok(());
        }

        let keep = bytes.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        tracing::warn!(
            "dropping {} byte(s) of interrupted append from {}",
            bytes.len() - keep,
            self.path.display()
        );
        let file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| PingError::LogAppend(format!("cannot open ping log: {e}")))?;
        file.set_len(keep as u64)
            .map_err(|e| PingError::LogAppend(format!("cannot truncate ping log: {e}")))?;
        file.sync_data()
            .map_err(|e| PingError::LogAppend(format!("cannot sync ping log: {e}")))?;
        Ok(())
    }

    fn write_line(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PingError::LogAppend(format!("cannot open ping log: {e}")))?;
        writeln!(file, "{line}")
            .map_err(|e| PingError::LogAppend(format!("cannot append ping: {e}")))?;
        file.sync_data()
            .map_err(|e| PingError::LogAppend(format!("cannot sync ping log: {e}")))?;
        Ok(())
    }
}

impl PingLog for JsonlPingLog {
    fn append(&mut self, ping: &NewPing) -> Result<u64> {
        let tail = self.tail()?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PingError::LogAppend(format!("cannot create ping log dir: {e}")))?;
        }

        let id = tail.last_id + 1;
        let record = ping.clone().into_record(id);
        let json = serde_json::to_string(&record)
            .map_err(|e| PingError::LogAppend(format!("cannot encode ping: {e}")))?;

        if let Err(e) = self.write_line(&json) {
            // The file may now end mid-line; rescan before the next append.
            self.tail = None;
            return Err(e);
        }

        self.tail = Some(LogTail {
            last_id: id,
            latest_time: tail.latest_time.max(Some(record.time)),
        });
        Ok(id)
    }

    fn latest_time(&mut self) -> Result<Option<u64>> {
        // Another process may have appended since the tail was cached.
        self.tail = None;
        Ok(self.tail()?.latest_time)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::scheduler::ports::{TAG_ANNOUNCED, TAG_OFF};

    #[test]
    fn empty_log_has_no_latest() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = JsonlPingLog::new(dir.path().join("pings.jsonl"));
        assert_eq!(log.latest_time().unwrap(), None);
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn appends_get_increasing_ids_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pings.jsonl");
        let mut log = JsonlPingLog::new(path.clone());

        assert_eq!(log.append(&NewPing::off(100)).unwrap(), 1);
        assert_eq!(log.append(&NewPing::announced(200)).unwrap(), 2);

        let mut reopened = JsonlPingLog::new(path);
        assert_eq!(reopened.latest_time().unwrap(), Some(200));
        assert_eq!(reopened.append(&NewPing::announced(300)).unwrap(), 3);

        let records = reopened.read_all().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].tags.contains(TAG_OFF));
        assert!(records[1].tags.contains(TAG_ANNOUNCED));
        assert_eq!(records[1].tags.len(), 1);
        assert_eq!(records[2].time, 300);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pings.jsonl");
        std::fs::write(
            &path,
            "{\"id\":1,\"time\":10,\"notes\":\"\",\"tags\":[\"OFF\"]}\nnot json\n\n{\"id\":2,\"time\":20}\n",
        )
        .unwrap();

        let mut log = JsonlPingLog::new(path);
        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(log.latest_time().unwrap(), Some(20));
        assert_eq!(log.append(&NewPing::off(30)).unwrap(), 3);
    }

    #[test]
    fn interrupted_append_fragment_is_dropped_before_next_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pings.jsonl");
        std::fs::write(
            &path,
            "{\"id\":1,\"time\":10,\"notes\":\"\",\"tags\":[\"OFF\"]}\n{\"id\":2,\"ti",
        )
        .unwrap();

        let mut log = JsonlPingLog::new(path.clone());
        assert_eq!(log.latest_time().unwrap(), Some(10));
        assert_eq!(log.append(&NewPing::announced(20)).unwrap(), 2);

        let records = log.read_all().unwrap();
        let times: Vec<u64> = records.iter().map(|r| r.time).collect();
        assert_eq!(times, vec![10, 20]);
        assert_eq!(records[1].id, 2);
        assert!(std::fs::read_to_string(&path).unwrap().ends_with('\n'));
    }

    #[test]
    fn fragment_without_any_complete_line_empties_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pings.jsonl");
        std::fs::write(&path, "{\"id\":1,").unwrap();

        let mut log = JsonlPingLog::new(path);
        assert_eq!(log.append(&NewPing::off(5)).unwrap(), 1);
        assert_eq!(log.read_all().unwrap().len(), 1);
    }

    #[test]
    fn latest_time_sees_appends_from_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pings.jsonl");
        let mut ours = JsonlPingLog::new(path.clone());
        let mut theirs = JsonlPingLog::new(path);

        ours.append(&NewPing::off(10)).unwrap();
        theirs.append(&NewPing::off(20)).unwrap();

        assert_eq!(ours.latest_time().unwrap(), Some(20));
        assert_eq!(ours.append(&NewPing::off(30)).unwrap(), 3);
    }

    #[test]
    fn recent_keeps_the_newest_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = JsonlPingLog::new(dir.path().join("pings.jsonl"));
        for t in 1..=5 {
            log.append(&NewPing::off(t * 10)).unwrap();
        }

        let times: Vec<u64> = log.recent(2).unwrap().iter().map(|r| r.time).collect();
        assert_eq!(times, vec![40, 50]);
        assert_eq!(log.recent(50).unwrap().len(), 5);
    }
}
