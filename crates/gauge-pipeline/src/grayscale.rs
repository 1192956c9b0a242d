//! Image decoding and grayscale conversion.
//!
//! Loading accepts a file path or raw bytes (PNG, JPEG, BMP, TIFF,
//! WebP) and produces the 3-channel [`RgbImage`] the pipeline owns as
//! its source. [`to_gray`] is the first half of preprocessing: the
//! rectified color image in, a single-channel luma image out.

use std::path::Path;

use image::{GrayImage, Luma, Rgb};

use crate::types::{PipelineError, RgbImage};

/// Decode raw image bytes into an RGB image.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Open and decode an image file into an RGB image.
///
/// # Errors
///
/// Returns [`PipelineError::ImageLoad`] if the file is missing,
/// unreadable, or not a decodable image.
pub fn open(path: &Path) -> Result<RgbImage, PipelineError> {
    let img = image::open(path).map_err(|source| PipelineError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgb8())
}

/// BT.601 luma weights `0.299`, `0.587`, `0.114` in 14-bit fixed point.
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// Convert a color image to luma.
///
/// Uses the BT.601 weights `Y = 0.299 R + 0.587 G + 0.114 B` (not the
/// Rec. 709 weights of [`image::imageops::grayscale`]), evaluated in
/// 14-bit fixed point with rounding so results match the usual
/// 8-bit color-to-gray conversion exactly.
///
/// Returns `None` if the input is empty.
#[must_use = "returns the grayscale image"]
pub fn to_gray(image: &RgbImage) -> Option<GrayImage> {
    if image.width() == 0 || image.height() == 0 {
        return None;
    }
    Some(imageproc::map::map_pixels(image, |Rgb([r, g, b])| {
        Luma([bt601_luma(r, g, b)])
    }))
}

#[allow(clippy::cast_possible_truncation)]
fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    let sum = u32::from(r) * LUMA_R + u32::from(g) * LUMA_G + u32::from(b) * LUMA_B;
    // The weights sum to 1 << LUMA_SHIFT, so the result fits in a u8.
    ((sum + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode a small uniform RGB image as a PNG byte buffer.
    fn encode_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb(rgb));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn missing_file_returns_load_error() {
        let result = open(Path::new("/definitely/not/here/gauge.png"));
        assert!(matches!(result, Err(PipelineError::ImageLoad { .. })));
    }

    #[test]
    fn valid_png_decodes_with_dimensions() {
        let png = encode_rgb(17, 31, [10, 20, 30]);
        let img = decode(&png).unwrap();
        assert_eq!(img.dimensions(), (17, 31));
        assert_eq!(img.get_pixel(3, 3).0, [10, 20, 30]);
    }

    #[test]
    fn empty_image_has_no_gray() {
        assert!(to_gray(&RgbImage::new(0, 5)).is_none());
    }

    #[test]
    fn white_stays_white() {
        let gray = to_gray(&RgbImage::from_pixel(2, 2, image::Rgb([255, 255, 255]))).unwrap();
        assert!(gray.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn grayscale_conversion_weights_channels() {
        // Weighted luma, not a plain average: green is brightest.
        let luma = |rgb: [u8; 3]| {
            to_gray(&RgbImage::from_pixel(1, 1, image::Rgb(rgb)))
                .unwrap()
                .get_pixel(0, 0)
                .0[0]
        };
        let r = luma([255, 0, 0]);
        let g = luma([0, 255, 0]);
        let b = luma([0, 0, 255]);
        assert!(
            g > r && r > b,
            "expected green > red > blue luminance, got R={r} G={g} B={b}",
        );
    }

    #[test]
    fn grayscale_uses_bt601_weights() {
        let img = RgbImage::from_fn(5, 1, |x, _| {
            image::Rgb(match x {
                0 => [255, 0, 0],
                1 => [0, 255, 0],
                2 => [0, 0, 255],
                3 => [100, 150, 200],
                _ => [255, 255, 255],
            })
        });
        let gray = to_gray(&img).unwrap();
        let values: Vec<u8> = gray.pixels().map(|p| p.0[0]).collect();
        // Rec. 709 weights would give 54, 182 and 18 for the primaries.
        assert_eq!(values, [76, 150, 29, 141, 255]);
    }
}
