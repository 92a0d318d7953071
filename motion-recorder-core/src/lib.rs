//! # motion-recorder-core
//!
//! Motion-triggered video recording core library.
//!
//! Keeps a rolling pre-roll of recent frames, runs background-subtraction
//! motion detection on a sample of them, and writes one segment per motion
//! event (pre-roll, motion, and a cool-down tail). Frame sources and segment
//! containers plug in through the `FrameSource` and `SegmentWriter` traits;
//! finalized segments are reported to an `EventSink`.
//!
//! ## Architecture
//!
//! ```text
//! motion-recorder-core (this crate)
//! ├── traits/       ← FrameSource, SegmentWriter, EventSink
//! ├── models/       ← RecorderError, RecorderConfig, Frame, RecordingState, MotionEvent, etc.
//! ├── processing/   ← CircularFrameBuffer, MotionDetector, morphology, Y4M format helpers
//! ├── session/      ← RecordingStateMachine, MotionRecorder (threaded pipeline)
//! └── storage/      ← Y4mSegmentWriter, Y4mFrameSource, JSON-lines event log
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::{AreaRule, MotionConfig, RecorderConfig, RecordingConfig};
pub use models::detection::{DetectionResult, Region};
pub use models::diagnostics::RecorderDiagnostics;
pub use models::error::RecorderError;
pub use models::event::{FinalizedSegment, MotionEvent};
pub use models::frame::{Frame, FrameFormat, FrameTimestamp, PixelLayout};
pub use models::state::RecordingState;
pub use processing::frame_buffer::CircularFrameBuffer;
pub use processing::motion_detector::MotionDetector;
pub use session::recorder::MotionRecorder;
pub use session::state_machine::{RecordingStateMachine, SessionInfo};
pub use storage::event_log::{JsonLinesEventLog, MemoryEventSink};
pub use storage::segment_writer::{Y4mSegment, Y4mSegmentWriter};
pub use storage::y4m_source::Y4mFrameSource;
pub use traits::event_sink::EventSink;
pub use traits::frame_source::FrameSource;
pub use traits::segment_writer::SegmentWriter;
