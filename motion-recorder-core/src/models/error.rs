use thiserror::Error;

/// Errors that can occur while configuring or running the recorder.
///
/// Detector and buffer operations have no per-frame error path; everything
/// here is either a construction-time failure or a storage/sink failure
/// surfaced to the recording state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported frame format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("frame source error: {0}")]
    Source(String),

    #[error("event sink error: {0}")]
    EventSink(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RecorderError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
