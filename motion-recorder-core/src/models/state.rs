use std::fmt;

/// Recording state machine state.
///
/// State transitions:
/// ```text
/// idle ──motion──→ active ──no motion──→ cooling_down ──timeout──→ idle
///                    ↑                        │
///                    └────────motion──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingState {
    Idle,
    Active,
    CoolingDown,
}

impl RecordingState {
    /// Whether a session exists and frames are being forwarded to the writer.
    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Active | Self::CoolingDown)
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::CoolingDown => "cooling_down",
        };
        f.write_str(name)
    }
}
