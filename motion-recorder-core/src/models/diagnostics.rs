use std::time::Instant;

/// Counters for debugging a running recorder.
#[derive(Debug, Clone, Default)]
pub struct RecorderDiagnostics {
    pub frames_captured: u64,
    pub frames_sampled: u64,
    /// Frames meant for the detector that were skipped because it was busy.
    pub samples_skipped: u64,
    /// Frames that could not be queued for the writer.
    pub frames_dropped: u64,
    pub frames_appended: u64,
    pub segments_finalized: u64,
    pub write_failures: u64,
    pub source_errors: u64,
    pub last_frame_at: Option<Instant>,
}
