//! Binary morphology on foreground masks (values 0 or 1).
//!
//! Square structuring elements are applied as two separable 1-D passes with
//! a running sum, so cost does not grow with the kernel size. Pixels outside
//! the image are ignored rather than treated as background, which keeps
//! blobs touching the border intact.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Erode,
    Dilate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Reusable scratch space for morphology passes on one image size.
#[derive(Debug, Default)]
pub struct Morphology {
    scratch: Vec<u8>,
    prefix: Vec<u32>,
}

impl Morphology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opening then closing with a `kernel x kernel` square.
    ///
    /// Opening removes specks smaller than the kernel; closing fills pinholes
    /// inside the surviving blobs. A kernel of 1 leaves the mask unchanged.
    pub fn smooth(&mut self, mask: &mut [u8], width: usize, height: usize, kernel: usize) {
        let radius = kernel / 2;
        if radius == 0 || mask.is_empty() {
            return;
        }
        self.apply(mask, width, height, radius, Op::Erode);
        self.apply(mask, width, height, radius, Op::Dilate);
        self.apply(mask, width, height, radius, Op::Dilate);
        self.apply(mask, width, height, radius, Op::Erode);
    }

    fn apply(&mut self, mask: &mut [u8], width: usize, height: usize, radius: usize, op: Op) {
        self.scratch.resize(mask.len(), 0);
        sweep(mask, &mut self.scratch, width, height, radius, Axis::Horizontal, op, &mut self.prefix);
        sweep(&self.scratch, mask, width, height, radius, Axis::Vertical, op, &mut self.prefix);
    }
}

#[allow(clippy::too_many_arguments)]
fn sweep(
    src: &[u8],
    dst: &mut [u8],
    width: usize,
    height: usize,
    radius: usize,
    axis: Axis,
    op: Op,
    prefix: &mut Vec<u32>,
) {
    let (lines, len, line_step, elem_step) = match axis {
        Axis::Horizontal => (height, width, width, 1),
        Axis::Vertical => (width, height, 1, width),
    };

    for line in 0..lines {
        let base = line * line_step;

        prefix.clear();
        prefix.push(0);
        let mut acc = 0u32;
        for i in 0..len {
            acc += src[base + i * elem_step] as u32;
            prefix.push(acc);
        }

        for i in 0..len {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius + 1).min(len);
            let count = prefix[hi] - prefix[lo];
            let on = match op {
                Op::Erode => count as usize == hi - lo,
                Op::Dilate => count > 0,
            };
            dst[base + i * elem_step] = on as u8;
        }
    }
}
