use crate::models::error::RecorderError;
use crate::models::frame::{Frame, FrameFormat};

/// Interface for anything that produces raw frames at a roughly fixed rate.
///
/// Implemented by:
/// - `Y4mFrameSource` (YUV4MPEG2 file or pipe)
/// - Future: V4L2 / libcamera backends
///
/// The recorder pulls from a dedicated capture thread and stamps each frame
/// with its own sequence number, so implementations need not number frames.
pub trait FrameSource: Send {
    /// Format of every frame this source yields. Known before the first pull.
    fn format(&self) -> FrameFormat;

    /// Block until the next frame is available.
    ///
    /// `Ok(None)` signals end-of-stream. Errors are treated as transient: the
    /// capture loop logs them and pulls again.
    fn next_frame(&mut self) -> Result<Option<Frame>, RecorderError>;

    /// Whether frames arrive on their own clock, like a camera.
    ///
    /// A live source is never held back: frames the writer cannot take in
    /// time are dropped. A source that yields frames on demand (a file) is
    /// throttled to the pipeline instead, so no frame is lost.
    fn is_live(&self) -> bool {
        true
    }
}
