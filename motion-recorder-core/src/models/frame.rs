use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::error::RecorderError;

/// Pixel layout of a raw frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelLayout {
    /// One luma byte per pixel.
    Gray8,
    /// Packed R, G, B.
    Rgb24,
    /// Packed B, G, R.
    Bgr24,
    /// Packed R, G, B, A.
    Rgba32,
    /// Planar Y, then U and V at quarter resolution (I420).
    Yuv420p,
}

impl PixelLayout {
    /// Bytes per pixel for packed layouts, `None` for planar ones.
    pub fn packed_bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::Gray8 => Some(1),
            Self::Rgb24 | Self::Bgr24 => Some(3),
            Self::Rgba32 => Some(4),
            Self::Yuv420p => None,
        }
    }
}

impl fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gray8 => "gray8",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Rgba32 => "rgba32",
            Self::Yuv420p => "yuv420p",
        };
        f.write_str(name)
    }
}

/// Dimensions and layout shared by every frame of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
}

impl FrameFormat {
    pub fn new(width: u32, height: u32, layout: PixelLayout) -> Self {
        Self { width, height, layout }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Expected byte length of a frame buffer in this format.
    pub fn frame_len(&self) -> usize {
        match self.layout.packed_bytes_per_pixel() {
            Some(bpp) => self.pixel_count() * bpp,
            None => {
                let chroma = (self.width as usize / 2) * (self.height as usize / 2);
                self.pixel_count() + 2 * chroma
            }
        }
    }

    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RecorderError::UnsupportedFormat(format!(
                "zero-sized frame {}x{}",
                self.width, self.height
            )));
        }
        if self.layout == PixelLayout::Yuv420p && (self.width % 2 != 0 || self.height % 2 != 0) {
            return Err(RecorderError::UnsupportedFormat(format!(
                "yuv420p requires even dimensions, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.layout)
    }
}

/// Capture time of a frame: monotonic for interval math, wall clock for naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTimestamp {
    pub monotonic: Instant,
    pub wall: DateTime<Local>,
}

impl FrameTimestamp {
    pub fn now() -> Self {
        Self {
            monotonic: Instant::now(),
            wall: Local::now(),
        }
    }
}

/// An immutable captured frame.
///
/// Frames are shared read-only (`Arc<Frame>`) between the pre-roll buffer,
/// the detector and the segment writer.
#[derive(Clone, PartialEq)]
pub struct Frame {
    sequence: u64,
    timestamp: FrameTimestamp,
    format: FrameFormat,
    data: Vec<u8>,
}

impl Frame {
    /// Build a frame, rejecting buffers that do not match `format`.
    pub fn new(format: FrameFormat, data: Vec<u8>, timestamp: FrameTimestamp) -> Result<Self, RecorderError> {
        format.validate()?;
        if data.len() != format.frame_len() {
            return Err(RecorderError::InvalidFrame(format!(
                "{} expects {} bytes, got {}",
                format,
                format.frame_len(),
                data.len()
            )));
        }
        Ok(Self {
            sequence: 0,
            timestamp,
            format,
            data,
        })
    }

    /// Consume the frame and stamp it with its position in the capture stream.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp(&self) -> &FrameTimestamp {
        &self.timestamp
    }

    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("format", &self.format)
            .field("wall", &self.timestamp.wall)
            .field("bytes", &self.data.len())
            .finish()
    }
}
