//! Gaussian blur for noise reduction before edge detection.
//!
//! Uses a fixed 9×9 footprint with independent sigmas along x and y,
//! applied as two 1D passes through
//! [`imageproc::filter::separable_filter`].

use image::GrayImage;

/// Side length of the square blur footprint.
pub const KERNEL_SIZE: usize = 9;

/// Sigma used when the caller's sigma is not positive, derived from the
/// kernel size: `0.3 * ((ksize - 1) * 0.5 - 1) + 0.8`.
#[allow(clippy::cast_precision_loss)]
pub const FALLBACK_SIGMA: f64 = 0.3 * ((KERNEL_SIZE as f64 - 1.0) * 0.5 - 1.0) + 0.8;

/// Normalized 1D Gaussian weights of length [`KERNEL_SIZE`].
///
/// Non-positive (or NaN) sigmas use [`FALLBACK_SIGMA`].
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn gaussian_kernel(sigma: f64) -> [f32; KERNEL_SIZE] {
    let sigma = if sigma > 0.0 { sigma } else { FALLBACK_SIGMA };
    let half = (KERNEL_SIZE as f64 - 1.0) / 2.0;
    let scale = -0.5 / (sigma * sigma);
    let raw: [f64; KERNEL_SIZE] = std::array::from_fn(|i| {
        let d = i as f64 - half;
        (scale * d * d).exp()
    });
    let sum: f64 = raw.iter().sum();
    raw.map(|w| (w / sum) as f32)
}

/// Blur a grayscale image with separate x and y sigmas.
///
/// A non-positive `sigma_y` takes the value of `sigma_x`; whatever is
/// still non-positive after that falls back to [`FALLBACK_SIGMA`].
/// Returns `None` if the input is empty.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma_x: f64, sigma_y: f64) -> Option<GrayImage> {
    if image.width() == 0 || image.height() == 0 {
        return None;
    }
    let sigma_y = if sigma_y > 0.0 { sigma_y } else { sigma_x };
    let kx = gaussian_kernel(sigma_x);
    let ky = gaussian_kernel(sigma_y);
    Some(imageproc::filter::separable_filter(image, &kx, &ky))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Create a test image with a sharp black-to-white boundary at x=10.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| {
            if x < 10 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(2.0);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "sum = {sum}");
        for i in 0..KERNEL_SIZE / 2 {
            assert!((k[i] - k[KERNEL_SIZE - 1 - i]).abs() < 1e-7);
        }
        assert!(k[4] > k[3] && k[3] > k[0]);
    }

    #[test]
    fn non_positive_sigma_uses_size_derived_fallback() {
        assert!((FALLBACK_SIGMA - 1.7).abs() < 1e-12);
        assert_eq!(gaussian_kernel(0.0), gaussian_kernel(FALLBACK_SIGMA));
        assert_eq!(gaussian_kernel(-3.0), gaussian_kernel(FALLBACK_SIGMA));
        assert_eq!(gaussian_kernel(f64::NAN), gaussian_kernel(FALLBACK_SIGMA));
    }

    #[test]
    fn empty_input_produces_nothing() {
        assert!(gaussian_blur(&GrayImage::new(0, 0), 2.0, 2.0).is_none());
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = GrayImage::new(17, 31);
        let blurred = gaussian_blur(&img, 1.4, 1.4).unwrap();
        assert_eq!(blurred.dimensions(), (17, 31));
    }

    #[test]
    fn blur_smooths_sharp_edge() {
        let blurred = gaussian_blur(&sharp_edge_image(), 2.0, 2.0).unwrap();
        let left_of_edge = blurred.get_pixel(9, 10).0[0];
        let right_of_edge = blurred.get_pixel(10, 10).0[0];
        assert!(left_of_edge > 0, "got {left_of_edge}");
        assert!(right_of_edge < 255, "got {right_of_edge}");
    }

    #[test]
    fn vertical_edge_untouched_by_y_only_smoothing() {
        // A tiny x sigma leaves a vertical edge nearly sharp even with a
        // wide y sigma, because the two axes are independent.
        let blurred = gaussian_blur(&sharp_edge_image(), 0.1, 3.0).unwrap();
        assert!(blurred.get_pixel(8, 10).0[0] <= 1);
        assert!(blurred.get_pixel(11, 10).0[0] >= 254);
    }

    #[test]
    fn non_positive_sigma_y_follows_sigma_x() {
        let img = sharp_edge_image();
        let a = gaussian_blur(&img, 1.5, 0.0).unwrap();
        let b = gaussian_blur(&img, 1.5, 1.5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn uniform_image_unchanged_by_blur() {
        let img = GrayImage::from_pixel(12, 12, image::Luma([128]));
        let blurred = gaussian_blur(&img, 2.0, 2.0).unwrap();
        for pixel in blurred.pixels() {
            let diff = i16::from(pixel.0[0]) - 128;
            assert!(diff.abs() <= 1, "got {}", pixel.0[0]);
        }
    }
}
