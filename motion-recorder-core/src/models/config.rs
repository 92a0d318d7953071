use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::RecorderError;

/// Upper bound on the pre-roll buffer, in frames (10 minutes at 30 fps).
pub const MAX_PRE_BUFFER_FRAMES: usize = 18_000;

/// How the region areas of a detection are turned into a motion decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaRule {
    /// Motion when any single region is larger than `min_area`.
    #[default]
    LargestRegion,
    /// Motion when the summed area of all regions above `min_region_area`
    /// is larger than `min_area`.
    TotalArea,
}

/// Background-subtraction detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Per-pixel intensity difference (0-255 scale) above which a pixel is foreground.
    pub threshold: f32,

    /// Minimum area in pixels for the motion decision (see `area_rule`).
    pub min_area: u32,

    /// Regions at or below this many pixels are ignored under `AreaRule::TotalArea`.
    pub min_region_area: u32,

    pub area_rule: AreaRule,

    /// Side of the square noise-reduction kernel. Must be odd; 1 disables it.
    pub blur_size: u32,

    /// Exponential blend factor for the background model (0 < α < 1).
    pub learning_rate: f32,

    /// Run the detector on every n-th captured frame.
    pub frame_skip: u32,
}

impl MotionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(format!("threshold must be a non-negative number, got {}", self.threshold));
        }
        if self.blur_size == 0 || self.blur_size % 2 == 0 {
            return Err(format!("blur_size must be odd and at least 1, got {}", self.blur_size));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate < 1.0) {
            return Err(format!("learning_rate must be in (0, 1), got {}", self.learning_rate));
        }
        if self.frame_skip == 0 {
            return Err("frame_skip must be at least 1".into());
        }
        Ok(())
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            threshold: 25.0,
            min_area: 500,
            min_region_area: 0,
            area_rule: AreaRule::LargestRegion,
            blur_size: 5,
            learning_rate: 0.005,
            frame_skip: 2,
        }
    }
}

/// Pre-roll, cool-down and output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Nominal capture rate; sizes the pre-roll buffer and the segment frame rate.
    pub fps: f64,

    /// Seconds of footage kept before a motion trigger.
    pub pre_buffer_duration_secs: f64,

    /// Seconds of recording kept after the last observed motion.
    pub post_motion_timeout_secs: f64,

    /// Directory where segments are written.
    pub output_directory: PathBuf,

    /// Attempts per writer open/append before the operation is abandoned.
    pub write_retries: u32,

    /// Capacity of the capture-to-writer queue, in frames.
    pub writer_queue_frames: usize,

    /// A stream with no frame for this long is reported unhealthy.
    pub stall_timeout_secs: f64,
}

impl RecordingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(format!("fps must be positive, got {}", self.fps));
        }
        seconds("pre_buffer_duration_secs", self.pre_buffer_duration_secs)?;
        seconds("post_motion_timeout_secs", self.post_motion_timeout_secs)?;
        let pre_roll = self.pre_buffer_duration_secs * self.fps;
        if pre_roll > MAX_PRE_BUFFER_FRAMES as f64 {
            return Err(format!(
                "pre-roll of {:.0} frames exceeds the limit of {}",
                pre_roll, MAX_PRE_BUFFER_FRAMES
            ));
        }
        if self.write_retries == 0 {
            return Err("write_retries must be at least 1".into());
        }
        if self.writer_queue_frames == 0 {
            return Err("writer_queue_frames must be at least 1".into());
        }
        if seconds("stall_timeout_secs", self.stall_timeout_secs)?.is_zero() {
            return Err("stall_timeout_secs must be positive".into());
        }
        Ok(())
    }

    /// Number of frames the pre-roll buffer holds.
    pub fn pre_buffer_frames(&self) -> usize {
        // epsilon keeps 0.3 * 10.0 from rounding up to 4
        (self.pre_buffer_duration_secs * self.fps - 1e-9).ceil().max(0.0) as usize
    }

    pub fn pre_buffer_duration(&self) -> Duration {
        Duration::from_secs_f64(self.pre_buffer_duration_secs)
    }

    pub fn post_motion_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.post_motion_timeout_secs)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.stall_timeout_secs)
    }
}

/// A duration field must be a non-negative number of seconds that fits a `Duration`.
fn seconds(name: &str, value: f64) -> Result<Duration, String> {
    Duration::try_from_secs_f64(value).map_err(|_| format!("{} must be a non-negative duration, got {}", name, value))
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            pre_buffer_duration_secs: 5.0,
            post_motion_timeout_secs: 10.0,
            output_directory: PathBuf::from("recordings"),
            write_retries: 3,
            writer_queue_frames: 120,
            stall_timeout_secs: 10.0,
        }
    }
}

/// Immutable process configuration, built once and shared as `Arc<RecorderConfig>`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub motion: MotionConfig,
    pub recording: RecordingConfig,
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.motion.validate()?;
        self.recording.validate()
    }

    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, RecorderError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RecorderError::InvalidConfig(format!("failed to parse config: {}", e)))?;
        config.validate().map_err(RecorderError::InvalidConfig)?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, RecorderError> {
        let json = fs::read_to_string(path).map_err(|e| {
            RecorderError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}
