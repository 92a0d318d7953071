use crate::models::detection::Region;

/// Connected-component labelling of a binary mask (8-connectivity).
///
/// Keeps its visit map and work stack between calls so per-frame labelling
/// does not allocate once the image size is stable.
#[derive(Debug, Default)]
pub struct RegionFinder {
    visited: Vec<bool>,
    stack: Vec<usize>,
}

impl RegionFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connected group of non-zero pixels, in scan order of their first pixel.
    pub fn find(&mut self, mask: &[u8], width: usize, height: usize) -> Vec<Region> {
        self.visited.clear();
        self.visited.resize(mask.len(), false);

        let mut regions = Vec::new();
        for start in 0..mask.len() {
            if mask[start] == 0 || self.visited[start] {
                continue;
            }
            regions.push(self.flood(mask, width, height, start));
        }
        regions
    }

    fn flood(&mut self, mask: &[u8], width: usize, height: usize, start: usize) -> Region {
        let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
        let (mut max_x, mut max_y) = (0usize, 0usize);
        let mut area = 0u32;

        self.visited[start] = true;
        self.stack.push(start);

        while let Some(idx) = self.stack.pop() {
            let x = idx % width;
            let y = idx / width;
            area += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    let n = ny * width + nx;
                    if mask[n] != 0 && !self.visited[n] {
                        self.visited[n] = true;
                        self.stack.push(n);
                    }
                }
            }
        }

        Region {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
            area,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mask_has_no_regions() {
        assert!(RegionFinder::new().find(&[0; 16], 4, 4).is_empty());
    }

    #[test]
    fn separate_blobs_are_separate_regions() {
        #[rustfmt::skip]
        let mask = [
            1, 1, 0, 0, 0,
            1, 1, 0, 0, 0,
            0, 0, 0, 0, 1,
            0, 0, 0, 1, 1,
        ];
        let regions = RegionFinder::new().find(&mask, 5, 4);

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0], Region { x: 0, y: 0, width: 2, height: 2, area: 4 });
        assert_eq!(regions[1], Region { x: 3, y: 2, width: 2, height: 2, area: 3 });
    }

    #[test]
    fn diagonal_pixels_are_connected() {
        #[rustfmt::skip]
        let mask = [
            1, 0, 0,
            0, 1, 0,
            0, 0, 1,
        ];
        let regions = RegionFinder::new().find(&mask, 3, 3);

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 3);
        assert_eq!((regions[0].width, regions[0].height), (3, 3));
    }

    #[test]
    fn finder_is_reusable() {
        let mut finder = RegionFinder::new();
        assert_eq!(finder.find(&[1, 1, 1, 1], 2, 2).len(), 1);
        assert_eq!(finder.find(&[1, 0, 0, 0, 0, 1], 3, 2).len(), 2);
    }
}
