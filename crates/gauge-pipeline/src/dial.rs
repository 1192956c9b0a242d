//! Dial localization via the gradient Hough circle transform.
//!
//! The transform works in three passes over the edge map:
//!
//! 1. Edge points are re-extracted with a Canny pass at
//!    `(OUTER_THRESHOLD / 2, OUTER_THRESHOLD)` and each casts votes along
//!    the edge normal, in both directions, at every radius in the
//!    searched range. The normal is the dominant orientation of the
//!    Sobel structure tensor smoothed with [`TENSOR_SIGMA`]; a bare 3×3
//!    Sobel on a one-pixel digital curve snaps toward multiples of 45°
//!    and scatters the votes of large circles.
//! 2. Accumulator cells that are local maxima with more than
//!    [`INNER_THRESHOLD`] votes become center candidates, strongest
//!    first.
//! 3. For each candidate not within `min_dist` of an accepted circle,
//!    the radius is the 1-pixel distance band holding the most edge
//!    points per unit radius. The circle is accepted if that band holds
//!    more than [`INNER_THRESHOLD`] points.
//!
//! Only the radius bounds are tunable. The accumulator resolution, the
//! center spacing (`edges.height / 16`) and both thresholds are fixed.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::gaussian_blur_f32;

use crate::types::DetectedDial;

/// Accumulator cell size in pixels.
pub const ACCUMULATOR_RESOLUTION: f32 = 1.0;
/// High threshold of the internal Canny pass.
pub const OUTER_THRESHOLD: f32 = 100.0;
/// Minimum support, in votes and in edge points, for a circle.
pub const INNER_THRESHOLD: u32 = 30;
/// Gaussian sigma of the structure tensor that orients each vote.
pub const TENSOR_SIGMA: f32 = 3.0;

/// Minimum distance between detected centers for an edge map.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn min_center_distance(edges: &GrayImage) -> f32 {
    (edges.height() / 16) as f32
}

/// Locate the dial in the edge map.
///
/// Returns the first circle reported by [`hough_circles`], or `None`
/// when the image is empty or no circle is found. Callers keep their
/// previous dial on `None`.
#[must_use]
pub fn locate(edges: &GrayImage, min_radius: i32, max_radius: i32) -> Option<DetectedDial> {
    if edges.width() == 0 || edges.height() == 0 {
        return None;
    }
    let circles = hough_circles(
        edges,
        min_center_distance(edges),
        min_radius,
        max_radius,
    );
    tracing::debug!(candidates = circles.len(), "circle transform finished");
    circles.first().copied()
}

/// Gradient Hough circle transform.
///
/// Circles are returned strongest center first. A non-positive
/// `max_radius` searches up to the larger image side; a negative
/// `min_radius` is treated as zero.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::similar_names
)]
pub fn hough_circles(
    image: &GrayImage,
    min_dist: f32,
    min_radius: i32,
    max_radius: i32,
) -> Vec<DetectedDial> {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return Vec::new();
    }
    let min_radius = min_radius.max(0);
    let max_radius = if max_radius <= 0 {
        width.max(height) as i32
    } else {
        max_radius
    };
    if max_radius < min_radius {
        return Vec::new();
    }

    let edge_map = crate::canny::canny(image, OUTER_THRESHOLD / 2.0, OUTER_THRESHOLD);
    let [jxx, jxy, jyy] = structure_tensor(image);

    let idp = 1.0 / ACCUMULATOR_RESOLUTION;
    let acols = (width as f32 * idp).ceil() as i32;
    let arows = (height as f32 * idp).ceil() as i32;
    let astride = (acols + 2) as usize;
    let mut accum = vec![0u32; astride * (arows + 2) as usize];

    // 1. Vote along the edge normal from every edge point.
    let mut points: Vec<(f32, f32)> = Vec::new();
    for (x, y, pixel) in edge_map.enumerate_pixels() {
        if pixel.0[0] == 0 {
            continue;
        }
        let txx = jxx.get_pixel(x, y)[0];
        let txy = jxy.get_pixel(x, y)[0];
        let tyy = jyy.get_pixel(x, y)[0];
        // No dominant orientation: flat or isotropic neighborhood.
        if (txx - tyy).hypot(2.0 * txy) <= f32::EPSILON * (txx + tyy) {
            continue;
        }
        points.push((x as f32, y as f32));

        let (sy, sx) = (0.5 * (2.0 * txy).atan2(txx - tyy)).sin_cos();
        for sign in [1.0f32, -1.0] {
            for r in min_radius..=max_radius {
                let rf = r as f32 * idp * sign;
                let cx = (x as f32).mul_add(idp, sx * rf).floor() as i32;
                let cy = (y as f32).mul_add(idp, sy * rf).floor() as i32;
                if cx < 0 || cx >= acols || cy < 0 || cy >= arows {
                    break;
                }
                accum[(cy + 1) as usize * astride + (cx + 1) as usize] += 1;
            }
        }
    }
    if points.is_empty() {
        return Vec::new();
    }

    // 2. Local maxima above the vote threshold, strongest first.
    let mut centers: Vec<usize> = Vec::new();
    for y in 1..=arows as usize {
        for x in 1..=acols as usize {
            let base = y * astride + x;
            let v = accum[base];
            if v > INNER_THRESHOLD
                && v > accum[base - 1]
                && v >= accum[base + 1]
                && v > accum[base - astride]
                && v >= accum[base + astride]
            {
                centers.push(base);
            }
        }
    }
    centers.sort_by(|&a, &b| accum[b].cmp(&accum[a]).then(a.cmp(&b)));

    // 3. Radius estimation per surviving center.
    let min_dist_sq = min_dist * min_dist;
    let (min_r, max_r) = (min_radius as f32, max_radius as f32);
    let mut circles: Vec<DetectedDial> = Vec::new();
    let mut dists: Vec<f32> = Vec::with_capacity(points.len());
    for base in centers {
        let cy = (base / astride) as f32 - 1.0;
        let cx = (base % astride) as f32 - 1.0;
        let cx = (cx + 0.5) * ACCUMULATOR_RESOLUTION;
        let cy = (cy + 0.5) * ACCUMULATOR_RESOLUTION;

        let crowded = circles.iter().any(|c| {
            let (dx, dy) = (c.x - cx, c.y - cy);
            dx.mul_add(dx, dy * dy) < min_dist_sq
        });
        if crowded {
            continue;
        }

        dists.clear();
        dists.extend(points.iter().filter_map(|&(px, py)| {
            let d = (px - cx).hypot(py - cy);
            (min_r..=max_r).contains(&d).then_some(d)
        }));
        if let Some((radius, support)) = best_radius(&mut dists, ACCUMULATOR_RESOLUTION)
            && support > INNER_THRESHOLD
        {
            circles.push(DetectedDial {
                x: cx,
                y: cy,
                radius,
            });
        }
    }
    circles
}

/// Smoothed `[gx², gx·gy, gy²]` of the 3×3 Sobel gradients.
fn structure_tensor(image: &GrayImage) -> [Image<Luma<f32>>; 3] {
    let (gx, gy) = crate::canny::sobel_gradients(image);
    let smoothed = |product: fn(f32, f32) -> f32| {
        let raw = Image::from_fn(image.width(), image.height(), |x, y| {
            let h = f32::from(gx.get_pixel(x, y)[0]);
            let v = f32::from(gy.get_pixel(x, y)[0]);
            Luma([product(h, v)])
        });
        gaussian_blur_f32(&raw, TENSOR_SIGMA)
    };
    [
        smoothed(|h, _| h * h),
        smoothed(|h, v| h * v),
        smoothed(|_, v| v * v),
    ]
}

/// Pick the densest distance band.
///
/// Distances are sorted and split into runs no wider than `band`; each
/// run's median is a radius candidate scored by `count / radius`. Ties
/// keep the earlier (smaller) radius. Returns the radius and its count.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn best_radius(dists: &mut [f32], band: f32) -> Option<(f32, u32)> {
    if dists.is_empty() {
        return None;
    }
    dists.sort_by(f32::total_cmp);

    let mut best: Option<(f32, u32)> = None;
    let mut start = 0;
    for i in 1..=dists.len() {
        let run_ends = i == dists.len() || dists[i] - dists[start] > band;
        if !run_ends {
            continue;
        }
        let count = (i - start) as u32;
        let r = dists[(start + i) / 2];
        let better = match best {
            None => true,
            // count / r > best_count / best_r, without dividing by zero.
            Some((best_r, best_count)) => count as f32 * best_r > best_count as f32 * r,
        };
        if better {
            best = Some((r, count));
        }
        start = i;
    }
    best
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_circle_mut;

    /// Binary edge map of a ring, as the edge stage would produce it.
    fn ring_edges(width: u32, height: u32, center: (i32, i32), radius: i32) -> GrayImage {
        let mut disk = GrayImage::new(width, height);
        draw_filled_circle_mut(&mut disk, center, radius, Luma([255]));
        crate::canny::canny(&disk, 50.0, 150.0)
    }

    #[test]
    fn finds_single_ring() {
        let edges = ring_edges(200, 200, (100, 90), 60);
        let dial = locate(&edges, 40, 80).unwrap();
        assert!((dial.x - 100.0).abs() <= 2.0, "x = {}", dial.x);
        assert!((dial.y - 90.0).abs() <= 2.0, "y = {}", dial.y);
        assert!((dial.radius - 60.0).abs() <= 3.0, "r = {}", dial.radius);
    }

    #[test]
    fn radius_range_excluding_ring_finds_nothing() {
        let edges = ring_edges(200, 200, (100, 100), 60);
        assert!(locate(&edges, 5, 20).is_none());
    }

    #[test]
    fn blank_edges_find_nothing() {
        let edges = GrayImage::new(120, 120);
        assert!(locate(&edges, 10, 50).is_none());
    }

    #[test]
    fn empty_image_finds_nothing() {
        assert!(locate(&GrayImage::new(0, 0), 10, 50).is_none());
    }

    #[test]
    fn inverted_radius_range_finds_nothing() {
        let edges = ring_edges(200, 200, (100, 100), 60);
        assert!(hough_circles(&edges, 12.0, 80, 40).is_empty());
    }

    #[test]
    fn strongest_center_comes_first() {
        // A large ring gathers more votes than a small one.
        let mut disk = GrayImage::new(300, 200);
        draw_filled_circle_mut(&mut disk, (90, 100), 70, Luma([255]));
        draw_filled_circle_mut(&mut disk, (240, 100), 30, Luma([255]));
        let edges = crate::canny::canny(&disk, 50.0, 150.0);
        let circles = hough_circles(&edges, 12.0, 20, 80);
        assert!(!circles.is_empty());
        assert!((circles[0].x - 90.0).abs() <= 2.0, "first = {:?}", circles[0]);
    }

    #[test]
    fn centers_are_accurate_across_radii() {
        for radius in [40_u8, 60, 65, 70, 75, 90, 110] {
            let r = i32::from(radius);
            let edges = ring_edges(300, 300, (150, 150), r);
            let dial = locate(&edges, r - 15, r + 15).unwrap();
            assert!(
                (dial.x - 150.0).abs() <= 2.0 && (dial.y - 150.0).abs() <= 2.0,
                "radius {radius}: center off, {dial:?}"
            );
            assert!(
                (dial.radius - f32::from(radius)).abs() <= 3.0,
                "radius {radius}: {dial:?}"
            );
        }
    }

    #[test]
    fn structure_tensor_orients_along_the_normal() {
        // Thin diagonal line: the normal runs at 45 degrees.
        let edges = GrayImage::from_fn(40, 40, |x, y| Luma([if x == y { 255 } else { 0 }]));
        let [jxx, jxy, jyy] = structure_tensor(&edges);
        let (a, b, c) = (
            jxx.get_pixel(20, 21)[0],
            jxy.get_pixel(20, 21)[0],
            jyy.get_pixel(20, 21)[0],
        );
        let theta = (0.5 * (2.0 * b).atan2(a - c)).to_degrees();
        assert!((theta.abs() - 45.0).abs() < 1.0, "theta = {theta}");
    }

    #[test]
    fn min_distance_follows_image_height() {
        assert!((min_center_distance(&GrayImage::new(10, 580)) - 36.0).abs() < f32::EPSILON);
    }

    #[test]
    fn best_radius_prefers_dense_band() {
        let mut d = vec![10.0, 10.2, 10.4, 30.0, 30.1, 30.2, 30.3, 30.4, 30.5];
        // 3 points at r~10 (0.3/px) beat 6 points at r~30 (0.2/px).
        let (r, count) = best_radius(&mut d, 1.0).unwrap();
        assert!((r - 10.2).abs() < 1e-6);
        assert_eq!(count, 3);
    }

    #[test]
    fn best_radius_of_nothing_is_none() {
        assert!(best_radius(&mut [], 1.0).is_none());
    }
}
