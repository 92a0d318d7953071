use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Result of closing a segment writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedSegment {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// SHA-256 hex digest of the finished file, when the writer computes one.
    pub checksum: Option<String>,
}

/// Record handed to the event sink once per finalized segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub id: String,
    /// Wall clock of the earliest pre-roll frame.
    pub start_time: DateTime<Local>,
    /// Wall clock of the last frame written.
    pub end_time: DateTime<Local>,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub frame_count: u64,
    pub checksum: Option<String>,
    /// Set when the session was force-finalized after a write failure.
    pub partial: bool,
}

impl MotionEvent {
    pub fn duration_secs(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
