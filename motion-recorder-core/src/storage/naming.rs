use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Segment file name for a session starting at `start`: `motion_YYYYMMDD_HHMMSS.<ext>`.
pub fn segment_file_name(start: &DateTime<Local>, extension: &str) -> String {
    format!("motion_{}.{}", start.format("%Y%m%d_%H%M%S"), extension)
}

/// Full path for a new segment under `dir`.
///
/// When the name is taken (two sessions in the same second), `_1`, `_2`, …
/// is appended before the extension.
pub fn segment_path(dir: &Path, start: &DateTime<Local>, extension: &str) -> PathBuf {
    let candidate = dir.join(segment_file_name(start, extension));
    if !candidate.exists() {
        return candidate;
    }

    let stem = format!("motion_{}", start.format("%Y%m%d_%H%M%S"));
    (1u32..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, extension)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    fn start() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap()
    }

    #[test]
    fn name_is_timestamp_derived() {
        assert_eq!(segment_file_name(&start(), "y4m"), "motion_20240307_090501.y4m");
    }

    #[test]
    fn collision_gets_suffix() {
        let dir = std::env::temp_dir().join(format!("motion_recorder_naming_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let first = segment_path(&dir, &start(), "y4m");
        assert_eq!(first, dir.join("motion_20240307_090501.y4m"));
        fs::write(&first, b"").unwrap();

        let second = segment_path(&dir, &start(), "y4m");
        assert_eq!(second, dir.join("motion_20240307_090501_1.y4m"));

        fs::remove_dir_all(&dir).ok();
    }
}
