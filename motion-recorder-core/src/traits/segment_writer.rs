use std::path::Path;

use crate::models::error::RecorderError;
use crate::models::event::FinalizedSegment;
use crate::models::frame::{Frame, FrameFormat};

/// Sink that turns an ordered run of frames into one finished video file.
///
/// The state machine owns at most one open handle at a time and calls
/// `append` in capture order. Implemented by `Y4mSegmentWriter`.
pub trait SegmentWriter: Send {
    /// Per-segment state returned by `open`.
    type Handle: Send;

    /// File extension (without the dot) used when naming segments.
    fn extension(&self) -> &str;

    /// Create the output at `path` for frames of `format` played back at `fps`.
    fn open(&mut self, path: &Path, format: &FrameFormat, fps: f64) -> Result<Self::Handle, RecorderError>;

    /// Append one frame. A failed append leaves everything written before it intact.
    fn append(&mut self, handle: &mut Self::Handle, frame: &Frame) -> Result<(), RecorderError>;

    /// Bytes in the output so far.
    fn bytes_written(&self, handle: &Self::Handle) -> u64;

    /// Flush and finalize the file.
    fn close(&mut self, handle: Self::Handle) -> Result<FinalizedSegment, RecorderError>;
}
