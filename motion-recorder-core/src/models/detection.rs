/// Bounding box and pixel count of one connected foreground region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub area: u32,
}

/// Per-frame detector output. Consumed by the state machine and then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetectionResult {
    pub motion: bool,
    /// Summed area of `regions`.
    pub total_area: u64,
    /// Regions that passed the area filter.
    pub regions: Vec<Region>,
}

impl DetectionResult {
    pub fn no_motion() -> Self {
        Self::default()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn largest_area(&self) -> u32 {
        self.regions.iter().map(|r| r.area).max().unwrap_or(0)
    }
}
