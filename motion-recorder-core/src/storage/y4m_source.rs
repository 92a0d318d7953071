use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::models::error::RecorderError;
use crate::models::frame::{Frame, FrameFormat, FrameTimestamp};
use crate::processing::y4m_format::{self, StreamHeader};
use crate::traits::frame_source::FrameSource;

/// Longest header or frame line accepted before the stream is declared corrupt.
const MAX_LINE_LEN: usize = 4096;

/// Frame source reading a YUV4MPEG2 stream from a file or pipe.
///
/// Frames are timestamped on the stream's own clock (`n / fps` after the
/// first frame), so detection and cool-down timing match the footage even
/// when the file is read faster than real time. By default the source is not
/// live and the recorder reads it as fast as it can process frames.
/// `realtime()` sleeps to deliver frames at the nominal rate, like a camera;
/// `live()` marks a pipe that is fed by a camera.
pub struct Y4mFrameSource<R: Read> {
    reader: BufReader<R>,
    header: StreamHeader,
    frame_interval: Duration,
    frames_read: u64,
    pace: bool,
    live: bool,
    origin: Option<(Instant, DateTime<Local>)>,
    line: Vec<u8>,
}

impl Y4mFrameSource<File> {
    pub fn open(path: &Path) -> Result<Self, RecorderError> {
        let file = File::open(path)
            .map_err(|e| RecorderError::Source(format!("failed to open {}: {}", path.display(), e)))?;
        Self::new(file)
    }
}

impl<R: Read> Y4mFrameSource<R> {
    /// Read and validate the stream header.
    pub fn new(reader: R) -> Result<Self, RecorderError> {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        if !read_line(&mut reader, &mut line)? {
            return Err(RecorderError::Source("empty stream".into()));
        }
        let text = std::str::from_utf8(&line)
            .map_err(|_| RecorderError::UnsupportedFormat("stream header is not text".into()))?;
        let header = y4m_format::parse_stream_header(text)?;

        log::info!("Y4M source opened: {} at {:.3} fps", header.format, header.fps);

        Ok(Self {
            reader,
            header,
            frame_interval: Duration::try_from_secs_f64(1.0 / header.fps)
                .map_err(|_| RecorderError::UnsupportedFormat(format!("frame rate {}", header.fps)))?,
            frames_read: 0,
            pace: false,
            live: false,
            origin: None,
            line,
        })
    }

    /// Deliver frames no faster than the stream's frame rate.
    pub fn realtime(mut self) -> Self {
        self.pace = true;
        self.live = true;
        self
    }

    /// Frames arrive on their own clock; the recorder drops rather than waits.
    pub fn live(mut self) -> Self {
        self.live = true;
        self
    }

    pub fn fps(&self) -> f64 {
        self.header.fps
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn timestamp(&mut self) -> FrameTimestamp {
        let (mono, wall) = *self.origin.get_or_insert_with(|| (Instant::now(), Local::now()));
        let offset = self.frame_interval * self.frames_read as u32;

        if self.pace {
            let due = mono + offset;
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }

        FrameTimestamp {
            monotonic: mono + offset,
            wall: wall + chrono::Duration::from_std(offset).unwrap_or_else(|_| chrono::Duration::zero()),
        }
    }
}

impl<R: Read + Send> FrameSource for Y4mFrameSource<R> {
    fn format(&self) -> FrameFormat {
        self.header.format
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, RecorderError> {
        if !read_line(&mut self.reader, &mut self.line)? {
            return Ok(None);
        }
        if !self.line.starts_with(b"FRAME") {
            return Err(RecorderError::Source(format!(
                "expected FRAME marker after frame {}",
                self.frames_read
            )));
        }

        let mut data = vec![0u8; self.header.format.frame_len()];
        match self.reader.read_exact(&mut data) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                log::warn!("Y4M stream truncated inside frame {}", self.frames_read);
                return Ok(None);
            }
            Err(e) => return Err(RecorderError::Source(format!("read failed: {}", e))),
        }

        let timestamp = self.timestamp();
        self.frames_read += 1;
        Frame::new(self.header.format, data, timestamp).map(Some)
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// Read one `\n`-terminated line into `buf` (newline stripped).
///
/// Returns `false` on clean end-of-stream.
fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<bool, RecorderError> {
    buf.clear();
    let read = reader
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', buf)
        .map_err(|e| RecorderError::Source(format!("read failed: {}", e)))?;
    if read == 0 {
        return Ok(false);
    }
    if buf.last() != Some(&b'\n') {
        return Err(RecorderError::Source("unterminated or oversized stream line".into()));
    }
    buf.pop();
    Ok(true)
}
