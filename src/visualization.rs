//! Prediction overlay rendering.
//!
//! Draws ground-truth keypoints (green filled circles) and predicted
//! keypoints (red X markers) on the resized model input image and saves one
//! overlay per sample.

use anyhow::Result;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};
use std::path::Path;

/// Forest green, matching the "expected" marker of the original tooling.
const GROUND_TRUTH_COLOR: Rgba<u8> = Rgba([34, 139, 34, 255]);

/// Red for predictions.
const PREDICTION_COLOR: Rgba<u8> = Rgba([220, 40, 40, 255]);

const MARKER_RADIUS: i32 = 4;
const X_ARM: f32 = 5.0;

/// Draw a filled circle with a darker outline for a ground-truth keypoint.
fn draw_ground_truth_marker(img: &mut RgbaImage, x: f32, y: f32) {
    let center = (x.round() as i32, y.round() as i32);
    draw_filled_circle_mut(img, center, MARKER_RADIUS, GROUND_TRUTH_COLOR);
    draw_hollow_circle_mut(img, center, MARKER_RADIUS + 1, Rgba([0, 80, 0, 255]));
}

/// Draw a thick X for a predicted keypoint.
fn draw_prediction_marker(img: &mut RgbaImage, x: f32, y: f32) {
    // Offset each diagonal by one pixel to get a 3px stroke, like the
    // bounding-box strokes elsewhere in the pack
    for offset in -1..=1i32 {
        let o = offset as f32;
        draw_line_segment_mut(
            img,
            (x - X_ARM, y - X_ARM + o),
            (x + X_ARM, y + X_ARM + o),
            PREDICTION_COLOR,
        );
        draw_line_segment_mut(
            img,
            (x - X_ARM, y + X_ARM + o),
            (x + X_ARM, y - X_ARM + o),
            PREDICTION_COLOR,
        );
    }
}

/// Render ground-truth and predicted keypoints onto a copy of the image.
///
/// Both keypoint sets are `(x, y)` pairs in the pixel space of `img`.
pub fn render_overlay(
    img: &DynamicImage,
    ground_truth: &[(f32, f32)],
    predictions: &[(f32, f32)],
) -> RgbaImage {
    let mut canvas = img.to_rgba8();

    for &(x, y) in ground_truth {
        draw_ground_truth_marker(&mut canvas, x, y);
    }
    for &(x, y) in predictions {
        draw_prediction_marker(&mut canvas, x, y);
    }

    canvas
}

/// Save an overlay image, creating parent directories as needed.
pub fn save_overlay(overlay: &RgbaImage, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    DynamicImage::ImageRgba8(overlay.clone()).save(output_path)?;
    Ok(())
}
