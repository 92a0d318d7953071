//! Pixel layout conversions (BT.601, full range).
//!
//! Integer coefficients are the usual 8-bit fixed-point approximations so
//! results are identical on every platform.

use crate::models::frame::{Frame, PixelLayout};

#[inline]
pub fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u8
}

#[inline]
fn rgb_to_chroma(r: i32, g: i32, b: i32) -> (u8, u8) {
    let cb = ((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128;
    let cr = ((128 * r - 107 * g - 21 * b + 128) >> 8) + 128;
    (cb.clamp(0, 255) as u8, cr.clamp(0, 255) as u8)
}

/// Offsets of R, G, B within a packed pixel, plus the pixel stride.
fn packed_rgb_offsets(layout: PixelLayout) -> Option<(usize, usize, usize, usize)> {
    match layout {
        PixelLayout::Rgb24 => Some((0, 1, 2, 3)),
        PixelLayout::Bgr24 => Some((2, 1, 0, 3)),
        PixelLayout::Rgba32 => Some((0, 1, 2, 4)),
        PixelLayout::Gray8 | PixelLayout::Yuv420p => None,
    }
}

/// Reduce a frame to one intensity sample per pixel, written into `out`.
///
/// `out` is resized to `width * height`; the allocation is reused across calls.
pub fn luma_into(frame: &Frame, out: &mut Vec<f32>) {
    let format = frame.format();
    let pixels = format.pixel_count();
    let data = frame.data();
    out.clear();
    out.reserve(pixels);

    match packed_rgb_offsets(format.layout) {
        Some((r, g, b, stride)) => {
            out.extend(
                data.chunks_exact(stride)
                    .map(|px| rgb_to_luma(px[r], px[g], px[b]) as f32),
            );
        }
        // Gray8 is already luma; planar 4:2:0 leads with the full-size Y plane.
        None => out.extend(data[..pixels].iter().map(|&y| y as f32)),
    }
}

/// Convert a packed RGB-family frame into planar I420 (Y, then U, then V).
///
/// Chroma planes are `ceil(w/2) x ceil(h/2)`; each chroma sample averages
/// the RGB of its 2x2 block.
pub fn packed_rgb_to_i420(frame: &Frame) -> Option<Vec<u8>> {
    let format = frame.format();
    let (ro, go, bo, stride) = packed_rgb_offsets(format.layout)?;
    let width = format.width as usize;
    let height = format.height as usize;
    let data = frame.data();

    let chroma_w = width.div_ceil(2);
    let chroma_h = height.div_ceil(2);
    let mut out = Vec::with_capacity(width * height + 2 * chroma_w * chroma_h);

    out.extend(
        data.chunks_exact(stride)
            .map(|px| rgb_to_luma(px[ro], px[go], px[bo])),
    );

    let mut u_plane = Vec::with_capacity(chroma_w * chroma_h);
    let mut v_plane = Vec::with_capacity(chroma_w * chroma_h);
    for cy in 0..chroma_h {
        for cx in 0..chroma_w {
            let (mut r, mut g, mut b, mut n) = (0i32, 0i32, 0i32, 0i32);
            for y in (cy * 2)..((cy * 2 + 2).min(height)) {
                for x in (cx * 2)..((cx * 2 + 2).min(width)) {
                    let px = (y * width + x) * stride;
                    r += data[px + ro] as i32;
                    g += data[px + go] as i32;
                    b += data[px + bo] as i32;
                    n += 1;
                }
            }
            let (cb, cr) = rgb_to_chroma(r / n, g / n, b / n);
            u_plane.push(cb);
            v_plane.push(cr);
        }
    }

    out.extend_from_slice(&u_plane);
    out.extend_from_slice(&v_plane);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::frame::{FrameFormat, FrameTimestamp};

    fn frame(layout: PixelLayout, width: u32, height: u32, data: Vec<u8>) -> Frame {
        Frame::new(FrameFormat::new(width, height, layout), data, FrameTimestamp::now()).unwrap()
    }

    #[test]
    fn luma_of_primaries() {
        assert_eq!(rgb_to_luma(0, 0, 0), 0);
        assert_eq!(rgb_to_luma(255, 255, 255), 255);
        assert_eq!(rgb_to_luma(255, 0, 0), 77);
    }

    #[test]
    fn luma_respects_channel_order() {
        let rgb = frame(PixelLayout::Rgb24, 1, 1, vec![255, 0, 0]);
        let bgr = frame(PixelLayout::Bgr24, 1, 1, vec![0, 0, 255]);
        let mut a = Vec::new();
        let mut b = Vec::new();
        luma_into(&rgb, &mut a);
        luma_into(&bgr, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn luma_of_yuv_uses_y_plane() {
        let yuv = frame(PixelLayout::Yuv420p, 2, 2, vec![10, 20, 30, 40, 128, 128]);
        let mut out = Vec::new();
        luma_into(&yuv, &mut out);
        assert_eq!(out, vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn grey_rgb_converts_to_neutral_chroma() {
        let rgba = frame(PixelLayout::Rgba32, 2, 2, [100, 100, 100, 255].repeat(4));
        let i420 = packed_rgb_to_i420(&rgba).unwrap();
        assert_eq!(i420.len(), 6);
        assert_eq!(&i420[..4], &[100, 100, 100, 100]);
        assert_eq!(&i420[4..], &[128, 128]);
    }

    #[test]
    fn odd_dimensions_round_chroma_up() {
        let rgb = frame(PixelLayout::Rgb24, 3, 1, vec![0; 9]);
        let i420 = packed_rgb_to_i420(&rgb).unwrap();
        // 3 luma + 2 * (2 * 1) chroma
        assert_eq!(i420.len(), 7);
    }

    #[test]
    fn planar_input_is_not_packed() {
        let gray = frame(PixelLayout::Gray8, 1, 1, vec![0]);
        assert!(packed_rgb_to_i420(&gray).is_none());
    }
}
