use crate::models::config::{AreaRule, MotionConfig};
use crate::models::detection::{DetectionResult, Region};
use crate::models::error::RecorderError;
use crate::models::frame::{Frame, FrameFormat};
use crate::processing::color;
use crate::processing::morphology::Morphology;
use crate::processing::regions::RegionFinder;

/// Background-subtraction motion detector.
///
/// Keeps an exponential running average of scene intensity. Each observed
/// frame is blended in with weight `learning_rate`, differenced against the
/// model, thresholded, cleaned with a morphological pass, and split into
/// connected regions whose areas decide the motion flag.
///
/// Every call contributes equally to the model regardless of the time
/// between calls, so sampling jitter does not change adaptation speed.
/// Instances are independent; nothing is shared between detectors.
pub struct MotionDetector {
    config: MotionConfig,
    format: FrameFormat,
    background: Vec<f32>,
    frames_observed: u64,

    // Per-frame working buffers, reused to avoid reallocating every call.
    luma: Vec<f32>,
    mask: Vec<u8>,
    morphology: Morphology,
    regions: RegionFinder,
}

impl MotionDetector {
    /// Build a detector for frames of `format`.
    ///
    /// Invalid settings and unusable formats are rejected here, so `observe`
    /// has no error path.
    pub fn new(config: &MotionConfig, format: FrameFormat) -> Result<Self, RecorderError> {
        config.validate().map_err(RecorderError::InvalidConfig)?;
        format.validate()?;

        log::info!(
            "Motion detector initialized for {} (threshold: {}, min_area: {}, rule: {:?})",
            format,
            config.threshold,
            config.min_area,
            config.area_rule
        );

        Ok(Self {
            config: config.clone(),
            format,
            background: Vec::new(),
            frames_observed: 0,
            luma: Vec::with_capacity(format.pixel_count()),
            mask: Vec::with_capacity(format.pixel_count()),
            morphology: Morphology::new(),
            regions: RegionFinder::new(),
        })
    }

    /// Classify one frame and fold it into the background model.
    ///
    /// The first frame seeds the model and never reports motion. A frame
    /// whose format differs from the one declared at construction is
    /// ignored and reported as no motion.
    pub fn observe(&mut self, frame: &Frame) -> DetectionResult {
        if *frame.format() != self.format {
            log::warn!(
                "Ignoring frame {} with format {} (detector expects {})",
                frame.sequence(),
                frame.format(),
                self.format
            );
            return DetectionResult::no_motion();
        }

        color::luma_into(frame, &mut self.luma);
        self.frames_observed += 1;

        if self.background.is_empty() {
            self.background.extend_from_slice(&self.luma);
            return DetectionResult::no_motion();
        }

        let alpha = self.config.learning_rate;
        let threshold = self.config.threshold;
        self.mask.clear();
        for (bg, &px) in self.background.iter_mut().zip(self.luma.iter()) {
            *bg = *bg * (1.0 - alpha) + px * alpha;
            self.mask.push(((px - *bg).abs() > threshold) as u8);
        }

        let width = self.format.width as usize;
        let height = self.format.height as usize;
        self.morphology
            .smooth(&mut self.mask, width, height, self.config.blur_size as usize);

        let regions = self.regions.find(&self.mask, width, height);
        self.decide(regions)
    }

    fn decide(&self, regions: Vec<Region>) -> DetectionResult {
        let min_area = self.config.min_area as u64;
        let (regions, motion): (Vec<Region>, _) = match self.config.area_rule {
            AreaRule::LargestRegion => {
                let qualifying: Vec<Region> = regions
                    .into_iter()
                    .filter(|r| r.area as u64 > min_area)
                    .collect();
                let motion = !qualifying.is_empty();
                (qualifying, motion)
            }
            AreaRule::TotalArea => {
                let floor = self.config.min_region_area;
                let qualifying: Vec<Region> = regions.into_iter().filter(|r| r.area > floor).collect();
                let total: u64 = qualifying.iter().map(|r| r.area as u64).sum();
                (qualifying, total > min_area)
            }
        };

        let total_area = regions.iter().map(|r| r.area as u64).sum();
        DetectionResult {
            motion,
            total_area,
            regions,
        }
    }

    /// Current background estimate, one value per pixel (empty before the first frame).
    pub fn background(&self) -> &[f32] {
        &self.background
    }

    pub fn frames_observed(&self) -> u64 {
        self.frames_observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::frame::{FrameTimestamp, PixelLayout};
    use approx::assert_relative_eq;

    const W: u32 = 64;
    const H: u32 = 64;

    fn config() -> MotionConfig {
        MotionConfig {
            threshold: 25.0,
            min_area: 150,
            min_region_area: 0,
            area_rule: AreaRule::LargestRegion,
            blur_size: 3,
            learning_rate: 0.01,
            frame_skip: 1,
        }
    }

    fn format() -> FrameFormat {
        FrameFormat::new(W, H, PixelLayout::Gray8)
    }

    fn flat(value: u8) -> Frame {
        Frame::new(format(), vec![value; (W * H) as usize], FrameTimestamp::now()).unwrap()
    }

    /// Dark frame with bright squares at the given (x, y, side).
    fn with_blobs(blobs: &[(u32, u32, u32)]) -> Frame {
        let mut data = vec![0u8; (W * H) as usize];
        for &(x0, y0, side) in blobs {
            for y in y0..y0 + side {
                for x in x0..x0 + side {
                    data[(y * W + x) as usize] = 255;
                }
            }
        }
        Frame::new(format(), data, FrameTimestamp::now()).unwrap()
    }

    fn warmed_up(config: &MotionConfig) -> MotionDetector {
        let mut detector = MotionDetector::new(config, format()).unwrap();
        for _ in 0..3 {
            assert!(!detector.observe(&flat(0)).motion);
        }
        detector
    }

    #[test]
    fn first_frame_seeds_background() {
        let mut detector = MotionDetector::new(&config(), format()).unwrap();
        let result = detector.observe(&with_blobs(&[(10, 10, 20)]));

        assert!(!result.motion);
        assert_eq!(detector.frames_observed(), 1);
        assert_eq!(detector.background().len(), (W * H) as usize);
    }

    #[test]
    fn identical_frames_never_report_motion() {
        let mut detector = warmed_up(&config());
        let frame = flat(0);
        for _ in 0..20 {
            let result = detector.observe(&frame);
            assert!(!result.motion);
            assert_eq!(result.total_area, 0);
        }
    }

    #[test]
    fn blob_below_min_area_is_ignored() {
        let mut detector = warmed_up(&config());
        // 10x10 = 100 < 150
        let result = detector.observe(&with_blobs(&[(20, 20, 10)]));

        assert!(!result.motion);
        assert!(result.regions.is_empty());
    }

    #[test]
    fn blob_above_min_area_triggers() {
        let mut detector = warmed_up(&config());
        // 20x20 = 400 > 150
        let result = detector.observe(&with_blobs(&[(20, 20, 20)]));

        assert!(result.motion);
        assert_eq!(result.total_area, 400);
        assert_eq!(result.regions, vec![Region { x: 20, y: 20, width: 20, height: 20, area: 400 }]);
    }

    #[test]
    fn largest_region_rule_ignores_many_small_blobs() {
        let mut detector = warmed_up(&config());
        // two 10x10 blobs: 200 total, but neither exceeds 150 alone
        let result = detector.observe(&with_blobs(&[(2, 2, 10), (40, 40, 10)]));
        assert!(!result.motion);
    }

    #[test]
    fn total_area_rule_sums_regions() {
        let config = MotionConfig {
            area_rule: AreaRule::TotalArea,
            ..config()
        };
        let mut detector = warmed_up(&config);
        let result = detector.observe(&with_blobs(&[(2, 2, 10), (40, 40, 10)]));

        assert!(result.motion);
        assert_eq!(result.region_count(), 2);
        assert_eq!(result.total_area, 200);
        assert_eq!(result.largest_area(), 100);
    }

    #[test]
    fn total_area_rule_honours_region_floor() {
        let config = MotionConfig {
            area_rule: AreaRule::TotalArea,
            min_region_area: 100,
            ..config()
        };
        let mut detector = warmed_up(&config);
        // 10x10 blobs sit exactly on the floor and are dropped
        let result = detector.observe(&with_blobs(&[(2, 2, 10), (40, 40, 10)]));
        assert!(!result.motion);
        assert_eq!(result.total_area, 0);
    }

    #[test]
    fn speckle_noise_is_suppressed_by_kernel() {
        let mut speckled = vec![0u8; (W * H) as usize];
        for y in (0..H).step_by(4) {
            for x in (0..W).step_by(4) {
                speckled[(y * W + x) as usize] = 255;
            }
        }
        let noisy = Frame::new(format(), speckled, FrameTimestamp::now()).unwrap();
        let sensitive = MotionConfig {
            min_area: 0,
            ..config()
        };

        let mut smoothed = warmed_up(&sensitive);
        assert!(!smoothed.observe(&noisy).motion);

        let mut raw = warmed_up(&MotionConfig {
            blur_size: 1,
            ..sensitive
        });
        assert!(raw.observe(&noisy).motion);
    }

    #[test]
    fn gradual_lighting_drift_is_absorbed() {
        let mut detector = MotionDetector::new(
            &MotionConfig {
                learning_rate: 0.2,
                ..config()
            },
            format(),
        )
        .unwrap();
        for level in 0..=100u8 {
            assert!(!detector.observe(&flat(level * 2)).motion, "level {}", level);
        }
    }

    #[test]
    fn static_object_becomes_background() {
        let mut detector = warmed_up(&MotionConfig {
            learning_rate: 0.5,
            ..config()
        });
        let parked = with_blobs(&[(20, 20, 20)]);

        assert!(detector.observe(&parked).motion);
        let mut last = true;
        for _ in 0..10 {
            last = detector.observe(&parked).motion;
        }
        assert!(!last);
    }

    #[test]
    fn background_follows_exponential_blend() {
        let mut detector = MotionDetector::new(&config(), format()).unwrap();
        detector.observe(&flat(100));
        detector.observe(&flat(200));

        assert_relative_eq!(detector.background()[0], 101.0, epsilon = 1e-3);
    }

    #[test]
    fn mismatched_frame_is_no_motion() {
        let mut detector = warmed_up(&config());
        let other = Frame::new(
            FrameFormat::new(8, 8, PixelLayout::Gray8),
            vec![255; 64],
            FrameTimestamp::now(),
        )
        .unwrap();

        assert_eq!(detector.observe(&other), DetectionResult::no_motion());
        assert_eq!(detector.frames_observed(), 3);
    }

    #[test]
    fn rgb_frames_are_reduced_to_luma() {
        let rgb_format = FrameFormat::new(32, 32, PixelLayout::Rgb24);
        let mut detector = MotionDetector::new(&config(), rgb_format).unwrap();
        let dark = Frame::new(rgb_format, vec![0; 32 * 32 * 3], FrameTimestamp::now()).unwrap();
        detector.observe(&dark);

        let mut data = vec![0u8; 32 * 32 * 3];
        for y in 4..24 {
            for x in 4..24 {
                let px = (y * 32 + x) * 3;
                data[px..px + 3].copy_from_slice(&[255, 255, 255]);
            }
        }
        let lit = Frame::new(rgb_format, data, FrameTimestamp::now()).unwrap();
        assert!(detector.observe(&lit).motion);
    }

    #[test]
    fn construction_rejects_bad_config_and_format() {
        let bad = MotionConfig {
            learning_rate: 0.0,
            ..config()
        };
        assert!(matches!(
            MotionDetector::new(&bad, format()),
            Err(RecorderError::InvalidConfig(_))
        ));
        assert!(matches!(
            MotionDetector::new(&config(), FrameFormat::new(0, 10, PixelLayout::Gray8)),
            Err(RecorderError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn detectors_are_independent() {
        let mut a = warmed_up(&config());
        let mut b = MotionDetector::new(&config(), format()).unwrap();
        b.observe(&flat(255));

        assert!(!a.observe(&flat(0)).motion);
        assert!(!b.observe(&flat(255)).motion);
        assert_relative_eq!(a.background()[0], 0.0);
        assert_relative_eq!(b.background()[0], 255.0);
    }
}
