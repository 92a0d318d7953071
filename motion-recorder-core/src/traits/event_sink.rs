use crate::models::error::RecorderError;
use crate::models::event::MotionEvent;

/// Receiver of one record per finalized segment.
///
/// Called from whichever recorder thread finalized the segment. A failure
/// is logged by the caller and the event dropped; the segment file is kept.
pub trait EventSink: Send + Sync {
    fn record_event(&self, event: &MotionEvent) -> Result<(), RecorderError>;
}
