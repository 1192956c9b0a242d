//! Perspective rectification of the gauge face.
//!
//! Maps the user-supplied quad onto the corner pixels of a fixed-size
//! rectangle and resamples with bilinear interpolation, producing a
//! fronto-parallel view that fixes the coordinate space for every
//! downstream stage.

use image::Rgb;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

use crate::types::{Dimensions, QuadPoints, RgbImage};

/// Corners of the output rectangle, in the quad's TL, TR, BR, BL order.
///
/// The corners are the centers of the corner pixels, so the quad's
/// first point lands on pixel `(0, 0)` and its third on
/// `(width - 1, height - 1)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn target_corners(size: Dimensions) -> [(f32, f32); 4] {
    let right = size.width.saturating_sub(1) as f32;
    let bottom = size.height.saturating_sub(1) as f32;
    [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)]
}

/// Compute the projective transform taking `quad` onto the output
/// rectangle of `size`.
///
/// Returns `None` when the solver finds no transform (e.g. three
/// collinear quad points). The quad is not otherwise validated.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn perspective_transform(quad: &QuadPoints, size: Dimensions) -> Option<Projection> {
    let from = (*quad).map(|p| (p.x as f32, p.y as f32));
    Projection::from_control_points(from, target_corners(size))
}

/// Warp `source` so that `quad` fills an image of `size`.
///
/// Returns `None` (nothing produced) when the source is empty, the
/// output size has a zero side, or no transform exists for the quad.
/// Pixels that map outside the source are black.
#[must_use = "returns the rectified image"]
pub fn rectify(source: &RgbImage, quad: &QuadPoints, size: Dimensions) -> Option<RgbImage> {
    if source.width() == 0 || source.height() == 0 {
        return None;
    }
    if size.width == 0 || size.height == 0 {
        tracing::warn!(?size, "output size has a zero side; skipping rectification");
        return None;
    }
    let Some(projection) = perspective_transform(quad, size) else {
        tracing::warn!(?quad, "no perspective transform for quad; skipping rectification");
        return None;
    };

    let mut out = RgbImage::new(size.width, size.height);
    warp_into(
        source,
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut out,
    );
    Some(out)
}
