use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::RecorderError;
use crate::models::event::FinalizedSegment;
use crate::models::frame::{Frame, FrameFormat, PixelLayout};
use crate::processing::color;
use crate::processing::y4m_format::{self, Colorspace};
use crate::traits::segment_writer::SegmentWriter;

/// Streaming YUV4MPEG2 segment writer.
///
/// ## File Format
///
/// ```text
/// [stream header line]
/// [FRAME\n][planar payload]
/// [FRAME\n][planar payload]
/// ...
/// ```
///
/// Gray frames are stored as `Cmono`, 4:2:0 frames as-is, and packed RGB
/// frames are converted to 4:2:0 on append. The stream has no trailer, so a
/// file cut short after any whole frame is still playable.
#[derive(Debug)]
pub struct Y4mSegmentWriter {
    /// fsync the file on close (default: true).
    sync_on_close: bool,
}

/// An open `.y4m` segment.
pub struct Y4mSegment {
    path: PathBuf,
    file: BufWriter<File>,
    format: FrameFormat,
    bytes_written: u64,
}

impl Y4mSegment {
    fn write_raw(&mut self, data: &[u8]) -> Result<(), RecorderError> {
        self.file
            .write_all(data)
            .map_err(|e| RecorderError::Storage(format!("write failed for {}: {}", self.path.display(), e)))?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }
}

impl Y4mSegmentWriter {
    pub fn new() -> Self {
        Self { sync_on_close: true }
    }

    /// Skip the fsync on close. Useful on tmpfs and in tests.
    pub fn without_sync(mut self) -> Self {
        self.sync_on_close = false;
        self
    }
}

impl Default for Y4mSegmentWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentWriter for Y4mSegmentWriter {
    type Handle = Y4mSegment;

    fn extension(&self) -> &str {
        "y4m"
    }

    fn open(&mut self, path: &Path, format: &FrameFormat, fps: f64) -> Result<Y4mSegment, RecorderError> {
        format.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RecorderError::Storage(format!("failed to create directory: {}", e)))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| RecorderError::Storage(format!("failed to create {}: {}", path.display(), e)))?;

        let mut segment = Y4mSegment {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
            format: *format,
            bytes_written: 0,
        };

        let header = y4m_format::generate_stream_header(
            format.width,
            format.height,
            fps,
            Colorspace::for_layout(format.layout),
        );
        segment.write_raw(header.as_bytes())?;
        Ok(segment)
    }

    fn append(&mut self, segment: &mut Y4mSegment, frame: &Frame) -> Result<(), RecorderError> {
        if *frame.format() != segment.format {
            return Err(RecorderError::InvalidFrame(format!(
                "segment {} expects {}, got {}",
                segment.path.display(),
                segment.format,
                frame.format()
            )));
        }

        segment.write_raw(y4m_format::FRAME_MARKER)?;
        match frame.format().layout {
            PixelLayout::Gray8 | PixelLayout::Yuv420p => segment.write_raw(frame.data())?,
            PixelLayout::Rgb24 | PixelLayout::Bgr24 | PixelLayout::Rgba32 => {
                let planar = color::packed_rgb_to_i420(frame)
                    .ok_or_else(|| RecorderError::InvalidFrame("packed conversion failed".into()))?;
                segment.write_raw(&planar)?;
            }
        }
        Ok(())
    }

    fn bytes_written(&self, segment: &Y4mSegment) -> u64 {
        segment.bytes_written
    }

    fn close(&mut self, segment: Y4mSegment) -> Result<FinalizedSegment, RecorderError> {
        let Y4mSegment { path, file, .. } = segment;

        let file = file
            .into_inner()
            .map_err(|e| RecorderError::Storage(format!("flush failed for {}: {}", path.display(), e.error())))?;
        if self.sync_on_close {
            file.sync_all()
                .map_err(|e| RecorderError::Storage(format!("sync failed for {}: {}", path.display(), e)))?;
        }
        drop(file);

        let size_bytes = fs::metadata(&path)
            .map_err(|e| RecorderError::Storage(format!("failed to stat {}: {}", path.display(), e)))?
            .len();
        let checksum = sha256_file(&path)?;

        Ok(FinalizedSegment {
            path,
            size_bytes,
            checksum: Some(checksum),
        })
    }
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, RecorderError> {
    let mut file = File::open(path)
        .map_err(|e| RecorderError::Storage(format!("failed to read file for checksum: {}", e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| RecorderError::Storage(format!("failed to read file for checksum: {}", e)))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::frame::FrameTimestamp;

    fn temp_file_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("motion_recorder_test_{}_{}", std::process::id(), name));
        fs::remove_file(&path).ok();
        path
    }

    fn frame(layout: PixelLayout, width: u32, height: u32, fill: u8) -> Frame {
        let format = FrameFormat::new(width, height, layout);
        Frame::new(format, vec![fill; format.frame_len()], FrameTimestamp::now()).unwrap()
    }

    #[test]
    fn write_yuv420_segment() {
        let path = temp_file_path("yuv.y4m");
        let format = FrameFormat::new(4, 2, PixelLayout::Yuv420p);
        let mut writer = Y4mSegmentWriter::new().without_sync();

        let mut segment = writer.open(&path, &format, 30.0).unwrap();
        writer.append(&mut segment, &frame(PixelLayout::Yuv420p, 4, 2, 7)).unwrap();
        writer.append(&mut segment, &frame(PixelLayout::Yuv420p, 4, 2, 9)).unwrap();
        let expected_len = writer.bytes_written(&segment);

        let finalized = writer.close(segment).unwrap();
        assert_eq!(finalized.size_bytes, expected_len);
        assert_eq!(finalized.checksum.as_ref().map(String::len), Some(64));

        let data = fs::read(&path).unwrap();
        let header = "YUV4MPEG2 W4 H2 F30:1 Ip A1:1 C420jpeg\n";
        assert!(data.starts_with(header.as_bytes()));
        // header + 2 * (marker + 8 luma + 4 chroma)
        assert_eq!(data.len(), header.len() + 2 * (6 + 12));
        assert_eq!(&data[header.len()..header.len() + 6], b"FRAME\n");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn gray_segment_is_mono() {
        let path = temp_file_path("gray.y4m");
        let format = FrameFormat::new(3, 3, PixelLayout::Gray8);
        let mut writer = Y4mSegmentWriter::new().without_sync();

        let mut segment = writer.open(&path, &format, 10.0).unwrap();
        writer.append(&mut segment, &frame(PixelLayout::Gray8, 3, 3, 1)).unwrap();
        writer.close(segment).unwrap();

        let data = fs::read(&path).unwrap();
        let header = "YUV4MPEG2 W3 H3 F10:1 Ip A1:1 Cmono\n";
        assert!(data.starts_with(header.as_bytes()));
        assert_eq!(data.len(), header.len() + 6 + 9);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn rgb_frames_are_converted_to_420() {
        let path = temp_file_path("rgb.y4m");
        let format = FrameFormat::new(2, 2, PixelLayout::Rgb24);
        let mut writer = Y4mSegmentWriter::new().without_sync();

        let mut segment = writer.open(&path, &format, 25.0).unwrap();
        writer.append(&mut segment, &frame(PixelLayout::Rgb24, 2, 2, 100)).unwrap();
        let finalized = writer.close(segment).unwrap();

        let data = fs::read(&path).unwrap();
        let payload = &data[data.len() - 6..];
        assert_eq!(payload, &[100, 100, 100, 100, 128, 128]);
        assert_eq!(finalized.size_bytes, data.len() as u64);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_frame_of_other_format() {
        let path = temp_file_path("mismatch.y4m");
        let format = FrameFormat::new(2, 2, PixelLayout::Gray8);
        let mut writer = Y4mSegmentWriter::new().without_sync();

        let mut segment = writer.open(&path, &format, 25.0).unwrap();
        let before = writer.bytes_written(&segment);
        let err = writer
            .append(&mut segment, &frame(PixelLayout::Gray8, 4, 4, 0))
            .unwrap_err();

        assert!(matches!(err, RecorderError::InvalidFrame(_)));
        assert_eq!(writer.bytes_written(&segment), before);
        writer.close(segment).unwrap();
        fs::remove_file(&path).ok();
    }

    #[test]
    fn open_refuses_to_overwrite() {
        let path = temp_file_path("existing.y4m");
        fs::write(&path, b"keep me").unwrap();
        let format = FrameFormat::new(2, 2, PixelLayout::Gray8);

        let err = Y4mSegmentWriter::new().open(&path, &format, 25.0).err().unwrap();
        assert!(matches!(err, RecorderError::Storage(_)));
        assert_eq!(fs::read(&path).unwrap(), b"keep me");

        fs::remove_file(&path).ok();
    }
}
