use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};

use crate::models::config::RecorderConfig;
use crate::models::detection::DetectionResult;
use crate::models::error::RecorderError;
use crate::models::event::MotionEvent;
use crate::models::frame::Frame;
use crate::models::state::RecordingState;
use crate::storage::naming;
use crate::traits::event_sink::EventSink;
use crate::traits::segment_writer::SegmentWriter;

/// The one open segment. Exists exactly while the state is active or cooling down.
struct RecordingSession<H> {
    id: String,
    handle: H,
    path: PathBuf,
    start_time: DateTime<Local>,
    last_frame_time: DateTime<Local>,
    last_motion: Instant,
    frame_count: u64,
    last_sequence: u64,
    /// Frames lost between appends, e.g. to a full writer queue.
    missing_frames: u64,
}

/// Read-only view of the open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: String,
    pub path: PathBuf,
    pub start_time: DateTime<Local>,
    pub frame_count: u64,
}

/// Decides when segments open, extend and close, and feeds them frames.
///
/// Two inputs drive it:
/// - `on_detection`, at the detector's sampling cadence, moves between
///   states and drains the pre-roll into a new segment;
/// - `on_frame`, at the full capture cadence, appends every frame of an
///   open session exactly once (by sequence number) and closes the session
///   once the cool-down has run out.
///
/// Shared between threads as `Arc<parking_lot::Mutex<RecordingStateMachine<W>>>`,
/// so an append and a transition can never interleave.
pub struct RecordingStateMachine<W: SegmentWriter> {
    config: Arc<RecorderConfig>,
    writer: W,
    events: Arc<dyn EventSink>,
    state: RecordingState,
    session: Option<RecordingSession<W::Handle>>,
    frames_appended: u64,
    segments_finalized: u64,
    write_failures: u64,
}

impl<W: SegmentWriter> RecordingStateMachine<W> {
    pub fn new(config: Arc<RecorderConfig>, writer: W, events: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            writer,
            events,
            state: RecordingState::Idle,
            session: None,
            frames_appended: 0,
            segments_finalized: 0,
            write_failures: 0,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn session(&self) -> Option<SessionInfo> {
        self.session.as_ref().map(|s| SessionInfo {
            id: s.id.clone(),
            path: s.path.clone(),
            start_time: s.start_time,
            frame_count: s.frame_count,
        })
    }

    pub fn frames_appended(&self) -> u64 {
        self.frames_appended
    }

    pub fn segments_finalized(&self) -> u64 {
        self.segments_finalized
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    /// Apply a detector verdict for `frame`.
    ///
    /// `pre_roll` is only called when a new session starts; it should return
    /// the current buffer snapshot, oldest first. Returns the event of a
    /// session that had to be force-finalized while draining the pre-roll.
    pub fn on_detection<F>(&mut self, frame: &Arc<Frame>, detection: &DetectionResult, pre_roll: F) -> Option<MotionEvent>
    where
        F: FnOnce() -> Vec<Arc<Frame>>,
    {
        let now = frame.timestamp().monotonic;

        match (self.state, detection.motion) {
            (RecordingState::Idle, true) => self.start_session(frame, pre_roll()),
            (RecordingState::Idle, false) => None,
            (RecordingState::Active, true) | (RecordingState::CoolingDown, true) => {
                if let Some(session) = self.session.as_mut() {
                    session.last_motion = session.last_motion.max(now);
                }
                if self.state == RecordingState::CoolingDown {
                    log::debug!("Motion resumed before timeout, continuing segment");
                    self.state = RecordingState::Active;
                }
                None
            }
            (RecordingState::Active, false) => {
                log::debug!("Motion stopped, cooling down");
                self.state = RecordingState::CoolingDown;
                None
            }
            (RecordingState::CoolingDown, false) => None,
        }
    }

    /// Forward one captured frame to the open session, if any.
    ///
    /// Frames already written (as pre-roll) are skipped, and a jump in
    /// sequence numbers marks the segment partial. Returns the event when
    /// this frame ends the session, either because the cool-down ran out or
    /// because the writer gave up.
    pub fn on_frame(&mut self, frame: &Arc<Frame>) -> Option<MotionEvent> {
        if !self.state.is_recording() {
            return None;
        }
        let session = self.session.as_ref()?;
        if frame.sequence() <= session.last_sequence {
            return None;
        }
        let missing = match session.frame_count {
            0 => 0,
            _ => frame.sequence() - session.last_sequence - 1,
        };

        let timeout = self.config.recording.post_motion_timeout();
        let elapsed = frame
            .timestamp()
            .monotonic
            .saturating_duration_since(session.last_motion);
        let cooling = self.state == RecordingState::CoolingDown;

        // A frame arriving after a gap past the deadline is not part of the segment.
        if cooling && elapsed > timeout {
            return self.finalize(false);
        }

        if missing > 0 {
            log::warn!("Segment is missing {} frames before frame {}", missing, frame.sequence());
            if let Some(session) = self.session.as_mut() {
                session.missing_frames += missing;
            }
        }

        if let Err(e) = self.append(frame) {
            log::error!("Abandoning segment after failed append: {}", e);
            return self.finalize(true);
        }

        if cooling && elapsed >= timeout {
            return self.finalize(false);
        }
        None
    }

    /// Finalize the open session, if any. Called once when the recorder stops.
    pub fn shutdown(&mut self) -> Option<MotionEvent> {
        if self.session.is_some() {
            log::info!("Finalizing in-flight segment on shutdown");
        }
        self.finalize(false)
    }

    fn start_session(&mut self, trigger: &Arc<Frame>, mut frames: Vec<Arc<Frame>>) -> Option<MotionEvent> {
        frames.push(Arc::clone(trigger));
        frames.sort_by_key(|f| f.sequence());
        frames.dedup_by_key(|f| f.sequence());

        // The segment is named after its first buffered frame, not the trigger.
        let start_time = frames.first().map_or(trigger.timestamp().wall, |f| f.timestamp().wall);

        let (handle, path) = match self.open_with_retry(&start_time, trigger) {
            Ok(opened) => opened,
            Err(e) => {
                log::error!("Failed to open segment, staying idle: {}", e);
                return None;
            }
        };

        log::info!(
            "Recording started: {} ({} pre-roll frames)",
            path.display(),
            frames.len() - 1
        );

        self.session = Some(RecordingSession {
            id: uuid::Uuid::new_v4().to_string(),
            handle,
            path,
            start_time,
            last_frame_time: start_time,
            last_motion: trigger.timestamp().monotonic,
            frame_count: 0,
            last_sequence: 0,
            missing_frames: 0,
        });
        self.state = RecordingState::Active;

        for frame in &frames {
            if let Err(e) = self.append(frame) {
                log::error!("Abandoning segment while writing pre-roll: {}", e);
                return self.finalize(true);
            }
        }
        None
    }

    /// The path is chosen again on every attempt, so a file left behind by a
    /// failed open is never reused.
    fn open_with_retry(
        &mut self,
        start_time: &DateTime<Local>,
        trigger: &Frame,
    ) -> Result<(W::Handle, PathBuf), RecorderError> {
        let attempts = self.config.recording.write_retries;
        let fps = self.config.recording.fps;
        let mut last_error = None;

        for attempt in 1..=attempts {
            let path = naming::segment_path(
                &self.config.recording.output_directory,
                start_time,
                self.writer.extension(),
            );
            match self.writer.open(&path, trigger.format(), fps) {
                Ok(handle) => return Ok((handle, path)),
                Err(e) => {
                    log::warn!(
                        "Segment open attempt {}/{} for {} failed: {}",
                        attempt,
                        attempts,
                        path.display(),
                        e
                    );
                    self.write_failures += 1;
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| RecorderError::Storage("no open attempts made".into())))
    }

    fn append(&mut self, frame: &Arc<Frame>) -> Result<(), RecorderError> {
        let attempts = self.config.recording.write_retries;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| RecorderError::Storage("no open segment".into()))?;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.writer.append(&mut session.handle, frame) {
                Ok(()) => {
                    session.frame_count += 1;
                    session.last_sequence = frame.sequence();
                    session.last_frame_time = frame.timestamp().wall;
                    self.frames_appended += 1;
                    return Ok(());
                }
                Err(e) => {
                    log::warn!(
                        "Append of frame {} attempt {}/{} failed: {}",
                        frame.sequence(),
                        attempt,
                        attempts,
                        e
                    );
                    self.write_failures += 1;
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| RecorderError::Storage("no append attempts made".into())))
    }

    /// Close the open segment and report it. Always returns to idle.
    fn finalize(&mut self, partial: bool) -> Option<MotionEvent> {
        let session = self.session.take()?;
        self.state = RecordingState::Idle;

        let RecordingSession {
            id,
            handle,
            path,
            start_time,
            last_frame_time,
            frame_count,
            missing_frames,
            ..
        } = session;
        let partial = partial || missing_frames > 0;

        let written = self.writer.bytes_written(&handle);
        let (path, size_bytes, checksum, partial) = match self.writer.close(handle) {
            Ok(segment) => (segment.path, segment.size_bytes, segment.checksum, partial),
            Err(e) => {
                log::error!("Failed to finalize segment {}: {}", path.display(), e);
                self.write_failures += 1;
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(written);
                (path, size, None, true)
            }
        };

        let event = MotionEvent {
            id,
            start_time,
            end_time: last_frame_time,
            path,
            size_bytes,
            frame_count,
            checksum,
            partial,
        };
        self.segments_finalized += 1;

        log::info!(
            "Recording finalized: {} ({} frames, {} bytes, {:.1}s{})",
            event.path.display(),
            event.frame_count,
            event.size_bytes,
            event.duration_secs(),
            if event.partial { ", partial" } else { "" }
        );

        if let Err(e) = self.events.record_event(&event) {
            log::error!("Failed to record event for {}: {}", event.path.display(), e);
        }
        Some(event)
    }
}
