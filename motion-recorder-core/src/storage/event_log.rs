use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use parking_lot::Mutex;

use crate::models::error::RecorderError;
use crate::models::event::MotionEvent;
use crate::traits::event_sink::EventSink;

/// Append-only event log: one JSON `MotionEvent` per line.
///
/// Writes are serialized through an internal lock so several recorders may
/// share one log.
pub struct JsonLinesEventLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every readable event in the log, oldest first. Corrupt lines are skipped.
    pub fn events(&self) -> Result<Vec<MotionEvent>, RecorderError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RecorderError::EventSink(format!("failed to read event log: {}", e))),
        };

        let mut events = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| RecorderError::EventSink(format!("failed to read event log: {}", e)))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MotionEvent>(&line) {
                Ok(event) => events.push(event),
                Err(e) => log::warn!("Skipping corrupt event log line {}: {}", index + 1, e),
            }
        }
        Ok(events)
    }

    /// Total number of recorded events.
    pub fn event_count(&self) -> Result<usize, RecorderError> {
        Ok(self.events()?.len())
    }

    /// Number of events whose segment started at or after `since`.
    pub fn event_count_since(&self, since: &DateTime<Local>) -> Result<usize, RecorderError> {
        Ok(self.events()?.iter().filter(|e| e.start_time >= *since).count())
    }

    /// Number of events since local midnight.
    pub fn event_count_today(&self) -> Result<usize, RecorderError> {
        let midnight = Local::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .ok_or_else(|| RecorderError::EventSink("local midnight is not representable".into()))?;
        self.event_count_since(&midnight)
    }
}

impl EventSink for JsonLinesEventLog {
    fn record_event(&self, event: &MotionEvent) -> Result<(), RecorderError> {
        let mut line = serde_json::to_string(event)
            .map_err(|e| RecorderError::EventSink(format!("failed to serialize event: {}", e)))?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| RecorderError::EventSink(format!("failed to create directory: {}", e)))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RecorderError::EventSink(format!("failed to open event log: {}", e)))?;
        file.write_all(line.as_bytes())
            .map_err(|e| RecorderError::EventSink(format!("failed to write event: {}", e)))?;

        log::info!(
            "Event recorded: {} ({} bytes)",
            event.path.display(),
            event.size_bytes
        );
        Ok(())
    }
}

/// Keeps events in memory. Handy for embedding and tests.
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<MotionEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MotionEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemoryEventSink {
    fn record_event(&self, event: &MotionEvent) -> Result<(), RecorderError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn temp_log(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("motion_recorder_events_{}_{}", std::process::id(), name));
        fs::remove_file(&path).ok();
        path
    }

    fn event(start: DateTime<Local>, name: &str) -> MotionEvent {
        MotionEvent {
            id: uuid::Uuid::new_v4().to_string(),
            start_time: start,
            end_time: start + Duration::seconds(12),
            path: PathBuf::from(format!("/recordings/{}", name)),
            size_bytes: 4096,
            frame_count: 360,
            checksum: Some("ab".repeat(32)),
            partial: false,
        }
    }

    #[test]
    fn appends_and_reads_back() {
        let path = temp_log("roundtrip.jsonl");
        let log = JsonLinesEventLog::new(&path);
        let first = event(Local::now(), "a.y4m");
        let second = event(Local::now(), "b.y4m");

        log.record_event(&first).unwrap();
        log.record_event(&second).unwrap();

        assert_eq!(log.events().unwrap(), vec![first, second]);
        assert_eq!(log.event_count().unwrap(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_log_is_empty() {
        let log = JsonLinesEventLog::new(temp_log("missing.jsonl"));
        assert_eq!(log.event_count().unwrap(), 0);
    }

    #[test]
    fn counts_since_cutoff() {
        let path = temp_log("since.jsonl");
        let log = JsonLinesEventLog::new(&path);
        let now = Local::now();
        log.record_event(&event(now - Duration::days(2), "old.y4m")).unwrap();
        log.record_event(&event(now, "new.y4m")).unwrap();

        assert_eq!(log.event_count_since(&(now - Duration::hours(1))).unwrap(), 1);
        assert_eq!(log.event_count_today().unwrap(), 1);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let path = temp_log("corrupt.jsonl");
        let log = JsonLinesEventLog::new(&path);
        log.record_event(&event(Local::now(), "ok.y4m")).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{not json\n\n").unwrap();

        assert_eq!(log.event_count().unwrap(), 1);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn memory_sink_collects() {
        let sink = MemoryEventSink::new();
        sink.record_event(&event(Local::now(), "m.y4m")).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.events()[0].frame_count, 360);
    }
}
