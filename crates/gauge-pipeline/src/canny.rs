//! Canny edge detection, vendored from `imageproc 0.26.0` and adapted.
//!
//! Differences from `imageproc::edges::canny`:
//!
//! 1. **No internal blur.** Upstream always smooths with sigma 1.4 before
//!    taking gradients. The gauge pipeline blurs explicitly with a
//!    user-tunable 9×9 kernel, and the dial locator runs Canny on an
//!    already-binary edge map, so neither wants a second blur.
//!
//! 2. **Threshold order is not asserted.** Upstream panics when
//!    `low > high`; here the two are swapped, which is how the
//!    reference dual-threshold operator treats them.
//!
//! 3. **Hysteresis fixes** from <https://github.com/image-rs/imageproc/pull/746>:
//!    bounds-checked neighbor coordinates (no `u32` underflow at the
//!    image border) and all 8 neighbors visited (upstream skipped north
//!    and northeast).
//!
//! 4. **L1 gradient magnitude.** Strength is `|gx| + |gy|` rather than
//!    the Euclidean norm, the default of the reference operator the
//!    threshold values are tuned for. Diagonal edges come out up to
//!    √2 stronger than with the L2 norm.
//!
//! The Sobel gradients are exported through [`sobel_gradients`] so the
//! circle transform can reuse them.

use image::{GrayImage, Luma};
use imageproc::definitions::{HasBlack, HasWhite, Image};
use imageproc::filter::filter_clamped;
use imageproc::kernel;

/// Horizontal and vertical 3×3 Sobel responses of `image`.
#[must_use]
pub fn sobel_gradients(image: &GrayImage) -> (Image<Luma<i16>>, Image<Luma<i16>>) {
    let gx = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);
    (gx, gy)
}

/// Runs the canny edge detection algorithm on an already-smoothed image.
///
/// Returns a binary image: 255 for edge pixels, 0 for non-edge. Images
/// smaller than 3×3 have no interior and come back all black.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let (low, high) = if low_threshold > high_threshold {
        (high_threshold, low_threshold)
    } else {
        (low_threshold, high_threshold)
    };
    if image.width() < 3 || image.height() < 3 {
        return GrayImage::new(image.width(), image.height());
    }

    // 1. Intensity of gradients.
    let (gx, gy) = sobel_gradients(image);
    let g: Vec<f32> = gx
        .iter()
        .zip(gy.iter())
        .map(|(h, v)| f32::from(*h).abs() + f32::from(*v).abs())
        .collect();
    let g = Image::from_fn(image.width(), image.height(), |x, y| {
        Luma([g[(y * image.width() + x) as usize]])
    });

    // 2. Non-maximum-suppression (make edges thinner).
    let thinned = non_maximum_suppression(&g, &gx, &gy);

    // 3. Hysteresis to filter out edges based on thresholds.
    hysteresis(&thinned, low, high)
}

/// Finds local maxima to make the edges thinner.
fn non_maximum_suppression(
    g: &Image<Luma<f32>>,
    gx: &Image<Luma<i16>>,
    gy: &Image<Luma<i16>>,
) -> Image<Luma<f32>> {
    let mut out = Image::from_pixel(g.width(), g.height(), Luma([0.0]));
    for y in 1..g.height() - 1 {
        for x in 1..g.width() - 1 {
            let x_gradient = f32::from(gx.get_pixel(x, y)[0]);
            let y_gradient = f32::from(gy.get_pixel(x, y)[0]);
            let mut angle = y_gradient.atan2(x_gradient).to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }

            // Get the two perpendicular neighbors of the quantized direction.
            let (cmp1, cmp2) = if (22.5..67.5).contains(&angle) {
                (g.get_pixel(x + 1, y + 1), g.get_pixel(x - 1, y - 1))
            } else if (67.5..112.5).contains(&angle) {
                (g.get_pixel(x, y - 1), g.get_pixel(x, y + 1))
            } else if (112.5..157.5).contains(&angle) {
                (g.get_pixel(x - 1, y + 1), g.get_pixel(x + 1, y - 1))
            } else {
                (g.get_pixel(x - 1, y), g.get_pixel(x + 1, y))
            };
            let pixel = *g.get_pixel(x, y);
            // If the pixel is not a local maximum, suppress it.
            if pixel[0] >= cmp1[0] && pixel[0] >= cmp2[0] {
                out.put_pixel(x, y, pixel);
            }
        }
    }
    out
}

/// Filter out edges with the thresholds.
/// Non-recursive depth-first flood from every strong pixel.
fn hysteresis(input: &Image<Luma<f32>>, low_thresh: f32, high_thresh: f32) -> GrayImage {
    let max_brightness = Luma::white();
    let (w, h) = input.dimensions();
    let mut out: GrayImage = Image::from_pixel(w, h, Luma::black());
    let mut edges = Vec::with_capacity((w as usize * h as usize) / 2);
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let inp_pix = *input.get_pixel(x, y);
            let out_pix = *out.get_pixel(x, y);
            // If the edge strength is higher than high_thresh, mark it as an edge.
            if inp_pix[0] >= high_thresh && out_pix[0] == 0 {
                out.put_pixel(x, y, max_brightness);
                edges.push((x, y));
                // Track neighbors until no neighbor is >= low_thresh.
                while let Some((nx, ny)) = edges.pop() {
                    let neighbor_indices = [
                        (nx + 1, ny),
                        (nx + 1, ny + 1),
                        (nx, ny + 1),
                        (nx.wrapping_sub(1), ny.wrapping_sub(1)),
                        (nx.wrapping_sub(1), ny),
                        (nx.wrapping_sub(1), ny + 1),
                        (nx, ny.wrapping_sub(1)),
                        (nx + 1, ny.wrapping_sub(1)),
                    ];

                    for &(ix, iy) in &neighbor_indices {
                        // wrapping_sub turns -1 into u32::MAX, caught here.
                        if ix >= w || iy >= h {
                            continue;
                        }
                        let in_neighbor = *input.get_pixel(ix, iy);
                        let out_neighbor = *out.get_pixel(ix, iy);
                        if in_neighbor[0] >= low_thresh && out_neighbor[0] == 0 {
                            out.put_pixel(ix, iy, max_brightness);
                            edges.push((ix, iy));
                        }
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 20x20 image with a sharp vertical boundary at x = 10.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| if x < 10 { Luma([0]) } else { Luma([255]) })
    }

    fn edge_count(edges: &GrayImage) -> u32 {
        edges.pixels().map(|p| u32::from(p.0[0] > 0)).sum()
    }

    /// Regression test for imageproc#705: hysteresis must not panic when
    /// the flood reaches the image border.
    #[test]
    fn border_edge_does_not_panic() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([0]));
        for y in 0..10 {
            img.put_pixel(1, y, Luma([255]));
        }
        let _edges = canny(&img, 1.0, 2.0);
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = GrayImage::new(17, 31);
        let edges = canny(&img, 50.0, 150.0);
        assert_eq!(edges.dimensions(), (17, 31));
    }

    #[test]
    fn tiny_image_has_no_edges() {
        let img = GrayImage::from_pixel(2, 2, Luma([255]));
        assert_eq!(canny(&img, 1.0, 2.0).dimensions(), (2, 2));
    }

    #[test]
    fn sharp_edge_detected() {
        let edges = canny(&sharp_edge_image(), 50.0, 150.0);
        assert!(edge_count(&edges) > 0, "expected edges at sharp boundary");
        // Edges hug the boundary.
        for (x, _, p) in edges.enumerate_pixels() {
            if p.0[0] > 0 {
                assert!((8..=11).contains(&x), "unexpected edge at x={x}");
            }
        }
    }

    #[test]
    fn diagonal_edge_uses_l1_strength() {
        // Sobel gives |gx| = |gy| = 765 next to the boundary: 1530 in L1,
        // about 1082 in L2.
        let img = GrayImage::from_fn(20, 20, |x, y| {
            if x + y < 20 { Luma([0]) } else { Luma([255]) }
        });
        let edges = canny(&img, 1335.0, 1335.0);
        assert!(edge_count(&edges) > 0, "diagonal edge below threshold");
        for (x, y, p) in edges.enumerate_pixels() {
            if p.0[0] > 0 {
                assert!((19..=20).contains(&(x + y)), "unexpected edge at ({x}, {y})");
            }
        }
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let img = GrayImage::from_pixel(20, 20, Luma([128]));
        assert_eq!(edge_count(&canny(&img, 50.0, 150.0)), 0);
    }

    #[test]
    fn swapped_thresholds_match_ordered() {
        let img = sharp_edge_image();
        assert_eq!(canny(&img, 150.0, 50.0), canny(&img, 50.0, 150.0));
    }

    #[test]
    fn sobel_responds_across_the_boundary_only() {
        let (gx, gy) = sobel_gradients(&sharp_edge_image());
        assert_ne!(gx.get_pixel(10, 10)[0], 0);
        assert_eq!(gx.get_pixel(3, 10)[0], 0);
        assert_eq!(gy.get_pixel(10, 10)[0], 0);
    }
}
