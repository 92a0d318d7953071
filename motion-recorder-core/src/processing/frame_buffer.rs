use std::sync::Arc;
use std::time::Duration;

use crate::models::frame::Frame;

/// Fixed-capacity circular buffer of the most recent frames (the pre-roll).
///
/// Wrap in `Arc<parking_lot::Mutex<CircularFrameBuffer>>` for cross-thread
/// access; `push` does constant work so the lock is held only briefly.
///
/// Overflow behavior: drops the oldest frame. Insertion never fails.
#[derive(Debug)]
pub struct CircularFrameBuffer {
    slots: Vec<Option<Arc<Frame>>>,
    write_index: usize,
    len: usize,
    capacity_duration: Duration,
}

impl CircularFrameBuffer {
    /// A buffer holding `capacity` frames, nominally spanning `capacity_duration`.
    pub fn new(capacity: usize, capacity_duration: Duration) -> Self {
        Self {
            slots: vec![None; capacity],
            write_index: 0,
            len: 0,
            capacity_duration,
        }
    }

    /// Size the buffer for `duration` of footage at `fps`.
    pub fn for_duration(duration: Duration, fps: f64) -> Self {
        let capacity = (duration.as_secs_f64() * fps - 1e-9).ceil().max(0.0) as usize;
        Self::new(capacity, duration)
    }

    /// Insert a frame, overwriting the oldest one when full.
    pub fn push(&mut self, frame: Arc<Frame>) {
        let capacity = self.slots.len();
        if capacity == 0 {
            return;
        }

        self.slots[self.write_index] = Some(frame);
        self.write_index = (self.write_index + 1) % capacity;
        if self.len < capacity {
            self.len += 1;
        }
    }

    /// Current contents, oldest first.
    ///
    /// The returned vector is independent of the buffer: later pushes do not
    /// change it.
    pub fn snapshot(&self) -> Vec<Arc<Frame>> {
        let capacity = self.slots.len();
        if self.len == 0 {
            return Vec::new();
        }

        let start = (self.write_index + capacity - self.len) % capacity;
        (0..self.len)
            .filter_map(|i| self.slots[(start + i) % capacity].clone())
            .collect()
    }

    /// Configured span of footage, for diagnostics.
    pub fn capacity_duration(&self) -> Duration {
        self.capacity_duration
    }

    /// Number of frames currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The total capacity of the buffer, in frames.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::frame::{FrameFormat, FrameTimestamp, PixelLayout};

    fn tagged(seq: u64) -> Arc<Frame> {
        let format = FrameFormat::new(1, 1, PixelLayout::Gray8);
        let frame = Frame::new(format, vec![seq as u8], FrameTimestamp::now()).unwrap();
        Arc::new(frame.with_sequence(seq))
    }

    fn sequences(frames: &[Arc<Frame>]) -> Vec<u64> {
        frames.iter().map(|f| f.sequence()).collect()
    }

    #[test]
    fn partial_pre_roll_has_no_padding() {
        let mut buf = CircularFrameBuffer::new(10, Duration::from_secs(1));
        for seq in 0..3 {
            buf.push(tagged(seq));
        }

        assert_eq!(buf.len(), 3);
        assert_eq!(sequences(&buf.snapshot()), vec![0, 1, 2]);
    }

    #[test]
    fn overflow_keeps_most_recent_in_order() {
        let mut buf = CircularFrameBuffer::new(4, Duration::from_secs(1));
        for seq in 0..11 {
            buf.push(tagged(seq));
            assert!(buf.snapshot().len() <= buf.capacity());
        }

        assert_eq!(buf.len(), buf.capacity());
        assert_eq!(sequences(&buf.snapshot()), vec![7, 8, 9, 10]);
    }

    #[test]
    fn snapshot_is_independent_of_later_pushes() {
        let mut buf = CircularFrameBuffer::new(3, Duration::from_secs(1));
        for seq in 0..3 {
            buf.push(tagged(seq));
        }
        let before = buf.snapshot();

        buf.push(tagged(3));
        buf.push(tagged(4));

        assert_eq!(sequences(&before), vec![0, 1, 2]);
        assert_eq!(sequences(&buf.snapshot()), vec![2, 3, 4]);
    }

    #[test]
    fn zero_capacity_accepts_and_discards() {
        let mut buf = CircularFrameBuffer::for_duration(Duration::ZERO, 30.0);
        buf.push(tagged(0));

        assert_eq!(buf.capacity(), 0);
        assert!(buf.is_empty());
        assert!(buf.snapshot().is_empty());
    }

    #[test]
    fn sized_from_duration_and_fps() {
        let buf = CircularFrameBuffer::for_duration(Duration::from_secs(5), 30.0);
        assert_eq!(buf.capacity(), 150);
        assert_eq!(buf.capacity_duration(), Duration::from_secs(5));
    }
}
