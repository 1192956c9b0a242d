//! Display overlays for the dial and needle stages.
//!
//! The overlays are plain owned images built from the rectified view;
//! they are outputs for display only and never feed back into
//! detection.

use image::Rgb;
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;

use crate::needle::Roi;
use crate::types::{DetectedDial, DetectedNeedle, RgbImage};

/// Dial circle color.
pub const DIAL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Dial center marker color.
pub const CENTER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Region-of-interest outline color.
pub const ROI_COLOR: Rgb<u8> = Rgb([0, 255, 255]);
/// Needle segment color.
pub const NEEDLE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const STROKE: i32 = 2;
const CENTER_RADIUS: i32 = 3;

/// Copy of `rectified` with the dial outline (2px) and a filled center
/// dot drawn on it.
#[must_use = "returns the annotated image"]
pub fn draw_dial(rectified: &RgbImage, dial: DetectedDial) -> RgbImage {
    let (x, y, radius) = dial.rounded();
    let mut canvas = rectified.clone();
    for r in radius - STROKE / 2..radius - STROKE / 2 + STROKE {
        draw_hollow_circle_mut(&mut canvas, (x, y), r, DIAL_COLOR);
    }
    draw_filled_circle_mut(&mut canvas, (x, y), CENTER_RADIUS, CENTER_COLOR);
    canvas
}

/// Copy of the dial overlay with the region of interest outlined and
/// the needle drawn in full-image coordinates.
///
/// `needle` is ROI-local; it is shifted by the ROI origin for drawing.
#[must_use = "returns the annotated image"]
#[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn draw_needle(dial_overlay: &RgbImage, roi: Roi, needle: DetectedNeedle) -> RgbImage {
    let mut canvas = dial_overlay.clone();

    for inset in 0..STROKE {
        let (w, h) = (roi.width - 2 * inset, roi.height - 2 * inset);
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(roi.x + inset, roi.y + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(&mut canvas, rect, ROI_COLOR);
    }

    let start = (
        (needle.x1 + roi.x) as f32,
        (needle.y1 + roi.y) as f32,
    );
    let end = (
        (needle.x2 + roi.x) as f32,
        (needle.y2 + roi.y) as f32,
    );
    let mostly_horizontal = (needle.x2 - needle.x1).abs() >= (needle.y2 - needle.y1).abs();
    for offset in 0..STROKE {
        let d = offset as f32;
        let (dx, dy) = if mostly_horizontal { (0.0, d) } else { (d, 0.0) };
        draw_line_segment_mut(
            &mut canvas,
            (start.0 + dx, start.1 + dy),
            (end.0 + dx, end.1 + dy),
            NEEDLE_COLOR,
        );
    }
    canvas
}
