// src/features.rs
//
// Per-frame feature extraction: region areas for the crosswalk and
// plate-car detectors, plus the reference-line estimate used during the
// outer→inner transition. Pure functions of the frame; every "nothing
// detected" case degrades to 0 / Lost rather than an error.

use crate::segmentation::{self, ColorClass, Mask};
use crate::types::{FeatureBundle, Frame, LineEstimate};

/// Blue is measured on a lower crop so sky and far-field clutter never vote.
const PLATE_CROP_DIVISOR: f32 = 2.5;
/// The turn-watch crop sits slightly higher; the target car is closer.
const TURN_CROP_DIVISOR: f32 = 2.2;

/// Minimum red pixels before a line fit is attempted.
const MIN_LINE_PIXELS: usize = 50;
/// A line needs at least this many populated columns; fewer means the
/// edge is vertical in pixel space and the tilt is undefined.
const MIN_LINE_COLUMNS: usize = 2;

pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, frame: &Frame) -> FeatureBundle {
        let plate_crop_start = (frame.height as f32 / PLATE_CROP_DIVISOR) as usize;
        let turn_crop_start = (frame.height as f32 / TURN_CROP_DIVISOR) as usize;

        let blue_plate = segmentation::color_mask(frame, ColorClass::Blue, plate_crop_start);
        let blue_turn = segmentation::color_mask(frame, ColorClass::Blue, turn_crop_start);
        let red_full = segmentation::color_mask(frame, ColorClass::Red, 0);

        FeatureBundle {
            blue_area: segmentation::largest_region_area(&blue_plate),
            turn_blue_area: segmentation::largest_region_area(&blue_turn),
            red_area: segmentation::largest_region_area(&red_full),
            line: estimate_line(&red_full),
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Fit the dominant straight edge of the mask by least squares over the
/// mean row of each populated column. Returns the tilt in degrees from
/// level and the mean pixel row, or `Lost` when the mask is too sparse
/// or the edge is vertical in pixel space.
pub fn estimate_line(mask: &Mask) -> LineEstimate {
    let mut samples: Vec<(f32, f32)> = Vec::new();
    let mut total_pixels = 0usize;

    for col in 0..mask.width {
        let mut sum_row = 0usize;
        let mut count = 0usize;
        for row in 0..mask.height {
            if mask.at(row, col) {
                sum_row += row;
                count += 1;
            }
        }
        if count > 0 {
            total_pixels += count;
            samples.push((col as f32, sum_row as f32 / count as f32));
        }
    }

    if total_pixels < MIN_LINE_PIXELS || samples.len() < MIN_LINE_COLUMNS {
        return LineEstimate::Lost;
    }

    let n = samples.len() as f32;
    let mean_x: f32 = samples.iter().map(|(x, _)| x).sum::<f32>() / n;
    let mean_y: f32 = samples.iter().map(|(_, y)| y).sum::<f32>() / n;

    let mut cov = 0.0f32;
    let mut var_x = 0.0f32;
    for (x, y) in &samples {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x) * (x - mean_x);
    }

    if var_x < f32::EPSILON {
        return LineEstimate::Lost;
    }

    let slope = cov / var_x;
    LineEstimate::Found {
        angle_deg: slope.atan().to_degrees(),
        row: mean_y,
    }
}
