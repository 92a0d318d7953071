use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::config::RecorderConfig;
use crate::models::diagnostics::RecorderDiagnostics;
use crate::models::error::RecorderError;
use crate::models::event::MotionEvent;
use crate::models::frame::{Frame, FrameFormat};
use crate::models::state::RecordingState;
use crate::processing::frame_buffer::CircularFrameBuffer;
use crate::processing::motion_detector::MotionDetector;
use crate::session::state_machine::RecordingStateMachine;
use crate::traits::event_sink::EventSink;
use crate::traits::frame_source::FrameSource;
use crate::traits::segment_writer::SegmentWriter;

/// Sampled frames waiting for the detector. Anything beyond this is skipped.
const SAMPLE_QUEUE_FRAMES: usize = 2;

/// Give up on a source after this many errors in a row.
const MAX_CONSECUTIVE_SOURCE_ERRORS: u32 = 50;

const SOURCE_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Motion-triggered recorder.
///
/// Generic over the frame source and segment writer. Runs three threads:
/// ```text
///                    ┌→ [CircularFrameBuffer] ──(pre-roll)──┐
/// [FrameSource] ─────┼→ every k-th frame → [MotionDetector] ─┼→ [RecordingStateMachine] → [SegmentWriter]
///  frame-capture     │                      motion-sampling  │
///                    └→ every frame ───────→ segment-writer ─┘
/// ```
/// A live source is never blocked: when the detector is busy the sample is
/// skipped, and when the writer queue is full the frame is dropped, counted,
/// and the open segment is marked partial. Sources that are not live (files)
/// wait for both queues instead, so every frame is examined and written.
pub struct MotionRecorder<S: FrameSource + 'static, W: SegmentWriter + 'static> {
    config: Arc<RecorderConfig>,
    format: FrameFormat,
    source: Option<S>,
    detector: Option<MotionDetector>,
    buffer: Arc<Mutex<CircularFrameBuffer>>,
    machine: Arc<Mutex<RecordingStateMachine<W>>>,
    diagnostics: Arc<Mutex<RecorderDiagnostics>>,

    shutdown: Arc<AtomicBool>,
    handles: Vec<thread::JoinHandle<()>>,
    finished: bool,
}

impl<S: FrameSource + 'static, W: SegmentWriter + 'static> MotionRecorder<S, W> {
    pub fn new(
        config: RecorderConfig,
        source: S,
        writer: W,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, RecorderError> {
        config.validate().map_err(RecorderError::InvalidConfig)?;

        let format = source.format();
        let detector = MotionDetector::new(&config.motion, format)?;

        let buffer = CircularFrameBuffer::for_duration(
            config.recording.pre_buffer_duration(),
            config.recording.fps,
        );
        log::info!(
            "Circular buffer initialized: {} frames ({:.1}s at {} fps)",
            buffer.capacity(),
            buffer.capacity_duration().as_secs_f64(),
            config.recording.fps
        );

        let config = Arc::new(config);
        let machine = RecordingStateMachine::new(Arc::clone(&config), writer, events);

        Ok(Self {
            config,
            format,
            source: Some(source),
            detector: Some(detector),
            buffer: Arc::new(Mutex::new(buffer)),
            machine: Arc::new(Mutex::new(machine)),
            diagnostics: Arc::new(Mutex::new(RecorderDiagnostics::default())),
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
            finished: false,
        })
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn state(&self) -> RecordingState {
        self.machine.lock().state()
    }

    /// `true` while any pipeline thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// Setting this flag to `true` asks the recorder to stop. Suitable for
    /// `signal_hook::flag::register`.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn diagnostics(&self) -> RecorderDiagnostics {
        let mut diagnostics = self.diagnostics.lock().clone();
        let machine = self.machine.lock();
        diagnostics.frames_appended = machine.frames_appended();
        diagnostics.segments_finalized = machine.segments_finalized();
        diagnostics.write_failures = machine.write_failures();
        diagnostics
    }

    /// `false` once no frame has arrived for `stall_timeout_secs`.
    pub fn is_stream_healthy(&self) -> bool {
        let stall_timeout = self.config.recording.stall_timeout();
        match self.diagnostics.lock().last_frame_at {
            Some(at) => at.elapsed() < stall_timeout,
            None => false,
        }
    }

    /// Spawn the capture, sampling and writer threads.
    pub fn start(&mut self) -> Result<(), RecorderError> {
        let (source, detector) = match (self.source.take(), self.detector.take()) {
            (Some(source), Some(detector)) => (source, detector),
            _ => return Err(RecorderError::InvalidConfig("recorder already started".into())),
        };

        let (sample_tx, sample_rx) = mpsc::sync_channel(SAMPLE_QUEUE_FRAMES);
        let (write_tx, write_rx) = mpsc::sync_channel(self.config.recording.writer_queue_frames);

        let writer = self.spawn_writer(write_rx)?;
        self.handles.push(writer);
        let sampler = self.spawn_sampler(detector, sample_rx)?;
        self.handles.push(sampler);
        let capture = self.spawn_capture(source, sample_tx, write_tx)?;
        self.handles.push(capture);

        log::info!(
            "Motion recorder started: {}, sampling every {} frames",
            self.format,
            self.config.motion.frame_skip
        );
        Ok(())
    }

    /// Block until the source ends or shutdown is requested, then finalize.
    ///
    /// Returns the event for a segment that was still open, if any.
    pub fn wait(&mut self) -> Option<MotionEvent> {
        if self.finished {
            return None;
        }

        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("Recorder thread panicked");
            }
        }
        self.finished = true;

        let event = self.machine.lock().shutdown();
        log::info!("Motion recorder stopped: {:?}", self.diagnostics());
        event
    }

    /// Request shutdown and finalize. A source blocked in `next_frame` is
    /// waited for.
    pub fn stop(&mut self) -> Option<MotionEvent> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wait()
    }

    fn spawn_capture(
        &self,
        mut source: S,
        sample_tx: SyncSender<Arc<Frame>>,
        write_tx: SyncSender<Arc<Frame>>,
    ) -> Result<thread::JoinHandle<()>, RecorderError> {
        let shutdown = Arc::clone(&self.shutdown);
        let buffer = Arc::clone(&self.buffer);
        let diagnostics = Arc::clone(&self.diagnostics);
        let frame_skip = u64::from(self.config.motion.frame_skip);
        let live = source.is_live();
        if !live {
            log::info!("Source is not live, capture will wait for the pipeline");
        }

        thread::Builder::new()
            .name("frame-capture".into())
            .spawn(move || {
                let mut sequence = 0u64;
                let mut consecutive_errors = 0u32;

                while !shutdown.load(Ordering::SeqCst) {
                    let frame = match source.next_frame() {
                        Ok(Some(frame)) => frame,
                        Ok(None) => {
                            log::info!("Frame source ended after {} frames", sequence);
                            break;
                        }
                        Err(e) => {
                            diagnostics.lock().source_errors += 1;
                            consecutive_errors += 1;
                            if consecutive_errors >= MAX_CONSECUTIVE_SOURCE_ERRORS {
                                log::error!("Frame source failed {} times in a row, stopping: {}", consecutive_errors, e);
                                break;
                            }
                            log::warn!("Frame source error: {}", e);
                            thread::sleep(SOURCE_RETRY_DELAY);
                            continue;
                        }
                    };
                    consecutive_errors = 0;

                    let frame = Arc::new(frame.with_sequence(sequence));
                    sequence += 1;

                    buffer.lock().push(Arc::clone(&frame));
                    {
                        let mut d = diagnostics.lock();
                        d.frames_captured += 1;
                        d.last_frame_at = Some(Instant::now());
                    }

                    if frame.sequence() % frame_skip == 0 {
                        match hand_off(&sample_tx, Arc::clone(&frame), live) {
                            Handoff::Sent => {}
                            Handoff::Full(_) => diagnostics.lock().samples_skipped += 1,
                            Handoff::Closed => break,
                        }
                    }

                    match hand_off(&write_tx, frame, live) {
                        Handoff::Sent => {}
                        Handoff::Full(frame) => {
                            diagnostics.lock().frames_dropped += 1;
                            log::warn!("Writer queue full, dropped frame {}", frame.sequence());
                        }
                        Handoff::Closed => break,
                    }
                }
                // Dropping the senders lets the other threads drain and exit.
            })
            .map_err(|e| RecorderError::Io(format!("failed to spawn capture thread: {}", e)))
    }

    fn spawn_sampler(
        &self,
        mut detector: MotionDetector,
        sample_rx: Receiver<Arc<Frame>>,
    ) -> Result<thread::JoinHandle<()>, RecorderError> {
        let buffer = Arc::clone(&self.buffer);
        let machine = Arc::clone(&self.machine);
        let diagnostics = Arc::clone(&self.diagnostics);

        thread::Builder::new()
            .name("motion-sampling".into())
            .spawn(move || {
                for frame in sample_rx {
                    let detection = detector.observe(&frame);
                    diagnostics.lock().frames_sampled += 1;

                    if detection.motion {
                        log::debug!(
                            "Motion in frame {}: {} regions, largest {} px",
                            frame.sequence(),
                            detection.region_count(),
                            detection.largest_area()
                        );
                    }

                    // Lock order: machine, then buffer.
                    machine
                        .lock()
                        .on_detection(&frame, &detection, || buffer.lock().snapshot());
                }
            })
            .map_err(|e| RecorderError::Io(format!("failed to spawn sampling thread: {}", e)))
    }

    fn spawn_writer(&self, write_rx: Receiver<Arc<Frame>>) -> Result<thread::JoinHandle<()>, RecorderError> {
        let machine = Arc::clone(&self.machine);

        thread::Builder::new()
            .name("segment-writer".into())
            .spawn(move || {
                for frame in write_rx {
                    machine.lock().on_frame(&frame);
                }
            })
            .map_err(|e| RecorderError::Io(format!("failed to spawn writer thread: {}", e)))
    }
}

enum Handoff {
    Sent,
    Full(Arc<Frame>),
    Closed,
}

/// Queue `frame` for a downstream thread. Only live sources give up on a full queue.
fn hand_off(tx: &SyncSender<Arc<Frame>>, frame: Arc<Frame>, live: bool) -> Handoff {
    if !live {
        return match tx.send(frame) {
            Ok(()) => Handoff::Sent,
            Err(_) => Handoff::Closed,
        };
    }
    match tx.try_send(frame) {
        Ok(()) => Handoff::Sent,
        Err(TrySendError::Full(frame)) => Handoff::Full(frame),
        Err(TrySendError::Disconnected(_)) => Handoff::Closed,
    }
}

impl<S: FrameSource + 'static, W: SegmentWriter + 'static> Drop for MotionRecorder<S, W> {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.stop();
        }
    }
}
