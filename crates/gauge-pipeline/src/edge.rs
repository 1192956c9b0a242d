//! Edge detection stage.
//!
//! Runs [`crate::canny::canny`] on the blurred image with the two
//! integer thresholds exactly as the caller gave them. The thresholds
//! are not ordered or clamped here; an inverted pair is resolved by the
//! operator itself.

use image::GrayImage;

/// Detect edges in the blurred image.
///
/// Returns a binary image (255 = edge). Returns `None` if the input is
/// empty.
#[must_use = "returns the binary edge map"]
#[allow(clippy::cast_precision_loss)]
pub fn detect(blurred: &GrayImage, threshold1: i32, threshold2: i32) -> Option<GrayImage> {
    if blurred.width() == 0 || blurred.height() == 0 {
        return None;
    }
    Some(crate::canny::canny(
        blurred,
        threshold1 as f32,
        threshold2 as f32,
    ))
}
