//! YUV4MPEG2 stream format utilities.
//!
//! Generates and parses the text stream header used by segment files and
//! by the Y4M frame source.
//!
//! Layout:
//! ```text
//! YUV4MPEG2 W<width> H<height> F<num>:<den> Ip A1:1 C<colorspace>\n
//! FRAME\n
//! <planar payload>
//! FRAME\n
//! ...
//! ```

use std::time::Duration;

use crate::models::error::RecorderError;
use crate::models::frame::{FrameFormat, PixelLayout};

pub const STREAM_MAGIC: &str = "YUV4MPEG2";
pub const FRAME_MARKER: &[u8] = b"FRAME\n";

/// Slowest accepted stream: one frame per hour.
pub const MIN_FRAME_RATE: f64 = 1.0 / 3600.0;

/// Colorspace tag written in the `C` header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colorspace {
    Mono,
    C420Jpeg,
}

impl Colorspace {
    /// Colorspace a frame of `layout` is stored as.
    pub fn for_layout(layout: PixelLayout) -> Self {
        match layout {
            PixelLayout::Gray8 => Self::Mono,
            _ => Self::C420Jpeg,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Mono => "mono",
            Self::C420Jpeg => "420jpeg",
        }
    }
}

/// Express a frame rate as the rational the `F` field requires.
pub fn frame_rate_ratio(fps: f64) -> (u32, u32) {
    if fps.fract().abs() < 1e-9 {
        (fps as u32, 1)
    } else {
        ((fps * 1000.0).round() as u32, 1000)
    }
}

/// Build the stream header line, including the trailing newline.
pub fn generate_stream_header(width: u32, height: u32, fps: f64, colorspace: Colorspace) -> String {
    let (num, den) = frame_rate_ratio(fps);
    format!(
        "{} W{} H{} F{}:{} Ip A1:1 C{}\n",
        STREAM_MAGIC,
        width,
        height,
        num,
        den,
        colorspace.tag()
    )
}

/// Parsed stream header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamHeader {
    pub format: FrameFormat,
    pub fps: f64,
}

/// Parse a stream header line (without the trailing newline).
///
/// Only progressive 4:2:0 and mono streams are accepted; anything else is
/// reported as an unsupported format.
pub fn parse_stream_header(line: &str) -> Result<StreamHeader, RecorderError> {
    let mut fields = line.split_ascii_whitespace();
    if fields.next() != Some(STREAM_MAGIC) {
        return Err(RecorderError::UnsupportedFormat("missing YUV4MPEG2 signature".into()));
    }

    let mut width = None;
    let mut height = None;
    let mut fps = 25.0;
    let mut layout = PixelLayout::Yuv420p;

    for field in fields {
        let mut chars = field.chars();
        let key = chars.next();
        let value = chars.as_str();
        match key {
            Some('W') => width = value.parse::<u32>().ok(),
            Some('H') => height = value.parse::<u32>().ok(),
            Some('F') => {
                let (num, den) = value
                    .split_once(':')
                    .ok_or_else(|| RecorderError::UnsupportedFormat(format!("bad frame rate '{}'", value)))?;
                let num: f64 = num.parse().map_err(|_| bad_field(field))?;
                let den: f64 = den.parse().map_err(|_| bad_field(field))?;
                let rate = num / den;
                if !rate.is_finite() || rate < MIN_FRAME_RATE || Duration::try_from_secs_f64(1.0 / rate).is_err() {
                    return Err(bad_field(field));
                }
                fps = rate;
            }
            Some('I') if value != "p" && value != "?" => {
                return Err(RecorderError::UnsupportedFormat(format!("interlacing '{}'", value)));
            }
            Some('C') => {
                layout = match value {
                    "mono" => PixelLayout::Gray8,
                    "420jpeg" | "420paldv" | "420mpeg2" | "420" => PixelLayout::Yuv420p,
                    other => {
                        return Err(RecorderError::UnsupportedFormat(format!("colorspace '{}'", other)));
                    }
                };
            }
            _ => {}
        }
    }

    let (Some(width), Some(height)) = (width, height) else {
        return Err(RecorderError::UnsupportedFormat("header lacks W/H fields".into()));
    };
    let format = FrameFormat::new(width, height, layout);
    format.validate()?;
    Ok(StreamHeader { format, fps })
}

fn bad_field(field: &str) -> RecorderError {
    RecorderError::UnsupportedFormat(format!("malformed header field '{}'", field))
}
