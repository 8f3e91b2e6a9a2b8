// src/segmentation.rs
//
// HSV-based color segmentation for track markings and car bodies.
//
// Handles the two color classes the controller cares about:
//   - BLUE  → parked car bodies carrying plates
//   - RED   → the crosswalk stop line / transition reference line
//
// All pixel math is done directly on the packed RGB buffer; no mask is
// ever required to be non-empty (zero regions are a normal answer).

use crate::types::Frame;

// ============================================================================
// PUBLIC TYPES
// ============================================================================

/// Named color class to segment for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorClass {
    Blue,
    Red,
}

/// Binary mask over a (possibly cropped) frame window.
#[derive(Debug, Clone)]
pub struct Mask {
    pub data: Vec<bool>,
    pub width: usize,
    pub height: usize,
}

impl Mask {
    pub fn at(&self, row: usize, col: usize) -> bool {
        self.data[row * self.width + col]
    }
}

/// Grayscale crop used for frame-difference scoring.
#[derive(Debug, Clone)]
pub struct GrayPatch {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

// ============================================================================
// HSV CONVERSION
// ============================================================================

/// Convert RGB to HSV.
/// Returns (H: 0-360, S: 0-100, V: 0-255).
#[inline]
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let r_n = r / 255.0;
    let g_n = g / 255.0;
    let b_n = b / 255.0;

    let max = r_n.max(g_n).max(b_n);
    let min = r_n.min(g_n).min(b_n);
    let delta = max - min;

    let mut h = if delta < 1e-6 {
        0.0
    } else if (max - r_n).abs() < 1e-6 {
        60.0 * (((g_n - b_n) / delta) % 6.0)
    } else if (max - g_n).abs() < 1e-6 {
        60.0 * (((b_n - r_n) / delta) + 2.0)
    } else {
        60.0 * (((r_n - g_n) / delta) + 4.0)
    };
    if h < 0.0 {
        h += 360.0;
    }

    let s = if max < 1e-6 { 0.0 } else { delta / max * 100.0 };
    let v = max * 255.0;

    (h, s, v)
}

fn matches_class(h: f32, s: f32, v: f32, class: ColorClass) -> bool {
    match class {
        ColorClass::Blue => (200.0..=280.0).contains(&h) && s >= 40.0 && v >= 40.0,
        ColorClass::Red => (h >= 340.0 || h <= 20.0) && s >= 50.0 && v >= 60.0,
    }
}

// ============================================================================
// MASKING & CROPPING
// ============================================================================

/// Segment `class` over the frame rows `[row_start, height)`.
/// `row_start` past the bottom yields an empty mask, not an error.
pub fn color_mask(frame: &Frame, class: ColorClass, row_start: usize) -> Mask {
    let row_start = row_start.min(frame.height);
    let height = frame.height - row_start;
    let mut data = vec![false; height * frame.width];

    for row in 0..height {
        for col in 0..frame.width {
            let (r, g, b) = frame.rgb_at(row + row_start, col);
            let (h, s, v) = rgb_to_hsv(r as f32, g as f32, b as f32);
            data[row * frame.width + col] = matches_class(h, s, v, class);
        }
    }

    Mask {
        data,
        width: frame.width,
        height,
    }
}

/// Grayscale central crop excluding a quarter of the frame on every side,
/// desensitizing the motion score to lens vignetting and edge noise.
pub fn central_gray_crop(frame: &Frame) -> GrayPatch {
    let margin_r = frame.height / 4;
    let margin_c = frame.width / 4;
    let r0 = margin_r;
    let r1 = frame.height - margin_r;
    let c0 = margin_c;
    let c1 = frame.width - margin_c;

    let width = c1 - c0;
    let height = r1 - r0;
    let mut data = Vec::with_capacity(width * height);

    for row in r0..r1 {
        for col in c0..c1 {
            let (r, g, b) = frame.rgb_at(row, col);
            data.push(0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32);
        }
    }

    GrayPatch {
        data,
        width,
        height,
    }
}

/// Mean squared pixel difference between two same-sized gray patches.
/// Identical patches score 0. Mismatched sizes read as maximal motion,
/// which the gate treats as an ambiguous (never "safe") signal.
pub fn motion_score(a: &GrayPatch, b: &GrayPatch) -> f32 {
    if a.data.is_empty() || a.width != b.width || a.height != b.height {
        return f32::MAX;
    }
    let sum: f32 = a
        .data
        .iter()
        .zip(b.data.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum();
    sum / a.data.len() as f32
}

// ============================================================================
// CONNECTED REGIONS
// ============================================================================

/// Pixel area of the largest 4-connected region in the mask; 0 when empty.
pub fn largest_region_area(mask: &Mask) -> u32 {
    if mask.data.is_empty() {
        return 0;
    }

    let mut visited = vec![false; mask.data.len()];
    let mut stack: Vec<usize> = Vec::new();
    let mut best: u32 = 0;

    for start in 0..mask.data.len() {
        if !mask.data[start] || visited[start] {
            continue;
        }
        let mut area: u32 = 0;
        visited[start] = true;
        stack.push(start);

        while let Some(idx) = stack.pop() {
            area += 1;
            let row = idx / mask.width;
            let col = idx % mask.width;

            let mut try_push = |r: usize, c: usize| {
                let n = r * mask.width + c;
                if mask.data[n] && !visited[n] {
                    visited[n] = true;
                    stack.push(n);
                }
            };

            if row > 0 {
                try_push(row - 1, col);
            }
            if row + 1 < mask.height {
                try_push(row + 1, col);
            }
            if col > 0 {
                try_push(row, col - 1);
            }
            if col + 1 < mask.width {
                try_push(row, col + 1);
            }
        }

        best = best.max(area);
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn solid_frame(width: usize, height: usize, rgb: (u8, u8, u8)) -> Frame {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&[rgb.0, rgb.1, rgb.2]);
        }
        Frame {
            data,
            width,
            height,
            timestamp_ms: 0.0,
        }
    }

    fn mask_from_rows(rows: &[&[u8]]) -> Mask {
        let height = rows.len();
        let width = rows[0].len();
        let data = rows.iter().flat_map(|r| r.iter().map(|&b| b != 0)).collect();
        Mask {
            data,
            width,
            height,
        }
    }

    #[test]
    fn hsv_primaries() {
        let (h, s, v) = rgb_to_hsv(255.0, 0.0, 0.0);
        assert_abs_diff_eq!(h, 0.0, epsilon = 0.01);
        assert_abs_diff_eq!(s, 100.0, epsilon = 0.01);
        assert_abs_diff_eq!(v, 255.0, epsilon = 0.01);

        let (h, _, _) = rgb_to_hsv(0.0, 0.0, 255.0);
        assert_abs_diff_eq!(h, 240.0, epsilon = 0.01);
    }

    #[test]
    fn hue_never_negative() {
        // magenta-ish pixel exercises the negative modulo branch
        let (h, _, _) = rgb_to_hsv(200.0, 10.0, 180.0);
        assert!(h >= 0.0 && h <= 360.0);
    }

    #[test]
    fn empty_mask_has_zero_area() {
        let frame = solid_frame(16, 16, (10, 10, 10));
        let mask = color_mask(&frame, ColorClass::Red, 0);
        assert_eq!(largest_region_area(&mask), 0);
    }

    #[test]
    fn largest_region_picks_biggest_component() {
        let mask = mask_from_rows(&[
            &[1, 1, 0, 0, 1],
            &[1, 1, 0, 0, 1],
            &[0, 0, 0, 0, 1],
            &[0, 1, 0, 0, 0],
        ]);
        assert_eq!(largest_region_area(&mask), 4);
    }

    #[test]
    fn diagonal_pixels_are_separate_regions() {
        let mask = mask_from_rows(&[&[1, 0], &[0, 1]]);
        assert_eq!(largest_region_area(&mask), 1);
    }

    #[test]
    fn crop_past_bottom_yields_empty_mask() {
        let frame = solid_frame(8, 8, (0, 0, 255));
        let mask = color_mask(&frame, ColorClass::Blue, 100);
        assert_eq!(mask.height, 0);
        assert_eq!(largest_region_area(&mask), 0);
    }

    #[test]
    fn motion_score_zero_for_identical_frames() {
        let frame = solid_frame(40, 40, (100, 150, 200));
        let a = central_gray_crop(&frame);
        let b = central_gray_crop(&frame);
        assert_abs_diff_eq!(motion_score(&a, &b), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn motion_score_is_symmetric() {
        let a = central_gray_crop(&solid_frame(40, 40, (0, 0, 0)));
        let b = central_gray_crop(&solid_frame(40, 40, (255, 255, 255)));
        assert_abs_diff_eq!(motion_score(&a, &b), motion_score(&b, &a), epsilon = 1e-3);
        assert!(motion_score(&a, &b) > 0.0);
    }

    #[test]
    fn mismatched_patches_read_as_maximal_motion() {
        let a = central_gray_crop(&solid_frame(40, 40, (0, 0, 0)));
        let b = central_gray_crop(&solid_frame(44, 44, (0, 0, 0)));
        assert_eq!(motion_score(&a, &b), f32::MAX);
    }

    #[test]
    fn blue_body_is_segmented() {
        let mut frame = solid_frame(20, 20, (200, 200, 200));
        // paint a 5x5 blue square
        for row in 5..10 {
            for col in 5..10 {
                let i = (row * 20 + col) * 3;
                frame.data[i] = 20;
                frame.data[i + 1] = 40;
                frame.data[i + 2] = 220;
            }
        }
        let mask = color_mask(&frame, ColorClass::Blue, 0);
        assert_eq!(largest_region_area(&mask), 25);
    }
}
