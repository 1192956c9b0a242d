//! Shared types for the gauge reading pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference the
/// color stage images without depending on `image` directly.
pub use image::RgbImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// Ordered perspective quad: top-left, top-right, bottom-right,
/// bottom-left, in source image coordinates.
pub type QuadPoints = [Point; 4];

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// The dial boundary found by circle detection, in rectified image
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedDial {
    /// Center x.
    pub x: f32,
    /// Center y.
    pub y: f32,
    /// Radius in pixels.
    pub radius: f32,
}

impl DetectedDial {
    /// Center and radius rounded to whole pixels, as used for the
    /// region of interest and the overlay. Halves round to even, so a
    /// center at `96.5` lands on pixel 96.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn rounded(self) -> (i32, i32, i32) {
        (
            self.x.round_ties_even() as i32,
            self.y.round_ties_even() as i32,
            self.radius.round_ties_even() as i32,
        )
    }
}

/// The needle segment `(x1, y1, x2, y2)` in coordinates local to the
/// region of interest it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedNeedle {
    /// First endpoint x.
    pub x1: i32,
    /// First endpoint y.
    pub y1: i32,
    /// Second endpoint x.
    pub x2: i32,
    /// Second endpoint y.
    pub y2: i32,
}

impl DetectedNeedle {
    /// Create a needle from its two endpoints.
    #[must_use]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Euclidean length of the segment.
    #[must_use]
    pub fn length(self) -> f64 {
        self.start().distance(self.end())
    }

    /// The first endpoint.
    #[must_use]
    pub fn start(self) -> Point {
        Point::new(f64::from(self.x1), f64::from(self.y1))
    }

    /// The second endpoint.
    #[must_use]
    pub fn end(self) -> Point {
        Point::new(f64::from(self.x2), f64::from(self.y2))
    }
}

/// Which needle endpoint is taken as the pointing tip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TipRule {
    /// The endpoint farther from the dial center is the tip; the nearer
    /// one is the pivot.
    #[default]
    FartherFromCenter,
    /// The endpoint nearer the dial center is the tip.
    NearerToCenter,
}

/// Mounting assumptions used to turn a needle angle into a reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingConvention {
    /// Degrees added to the screen angle before wrapping into
    /// `[0, 360)`; places the gauge minimum on the dial.
    pub rotation_deg: f64,
    /// Tip selection rule.
    pub tip: TipRule,
}

impl ReadingConvention {
    /// Default rotation offset in degrees.
    pub const DEFAULT_ROTATION_DEG: f64 = 270.0;
}

impl Default for ReadingConvention {
    fn default() -> Self {
        Self {
            rotation_deg: Self::DEFAULT_ROTATION_DEG,
            tip: TipRule::default(),
        }
    }
}

/// Parameters accepted for the probabilistic line transform.
///
/// Only `min_line_length` and `max_line_gap` reach the needle locator;
/// the locator runs at a fixed resolution and vote threshold (see
/// [`crate::needle`]). `rho`, `theta` and `threshold` are kept so a
/// front end can show what it set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoughLineParams {
    /// Distance resolution in pixels.
    pub rho: i32,
    /// Angle resolution in radians.
    pub theta: f64,
    /// Accumulator vote threshold.
    pub threshold: i32,
    /// Minimum segment extent in pixels.
    pub min_line_length: i32,
    /// Maximum gap in pixels bridged along a segment.
    pub max_line_gap: i32,
}

impl Default for HoughLineParams {
    fn default() -> Self {
        Self {
            rho: 1,
            theta: std::f64::consts::PI / 180.0,
            threshold: 30,
            min_line_length: GaugeConfig::DEFAULT_MIN_LINE_LENGTH,
            max_line_gap: GaugeConfig::DEFAULT_MAX_LINE_GAP,
        }
    }
}

/// Every tunable of the gauge pipeline.
///
/// No field is validated: negative sigmas, inverted thresholds and
/// empty radius ranges are passed through to the stages, which decide
/// what they mean. Front ends are expected to constrain ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeConfig {
    /// Source quad, ordered TL, TR, BR, BL.
    pub quad_points: QuadPoints,
    /// Rectified image size.
    pub output_size: Dimensions,
    /// Gaussian sigma along x.
    pub sigma_x: f64,
    /// Gaussian sigma along y.
    pub sigma_y: f64,
    /// First Canny threshold.
    pub canny_threshold1: i32,
    /// Second Canny threshold.
    pub canny_threshold2: i32,
    /// Smallest dial radius searched.
    pub min_radius: i32,
    /// Largest dial radius searched.
    pub max_radius: i32,
    /// Line transform parameters.
    pub line_params: HoughLineParams,
    /// Value at the gauge minimum.
    pub gauge_min: f64,
    /// Value at the gauge maximum.
    pub gauge_max: f64,
    /// Angle-to-value mounting assumptions.
    #[serde(default)]
    pub convention: ReadingConvention,
}

impl GaugeConfig {
    /// Default quad, matched to the reference gauge photograph.
    pub const DEFAULT_QUAD_POINTS: QuadPoints = [
        Point::new(60.0, 41.0),
        Point::new(620.0, 36.0),
        Point::new(585.0, 528.0),
        Point::new(55.0, 582.0),
    ];
    /// Default rectified width.
    pub const DEFAULT_OUTPUT_WIDTH: u32 = 613;
    /// Default rectified height.
    pub const DEFAULT_OUTPUT_HEIGHT: u32 = 580;
    /// Default Gaussian sigma (both axes).
    pub const DEFAULT_SIGMA: f64 = 2.0;
    /// Default first Canny threshold.
    pub const DEFAULT_CANNY_THRESHOLD1: i32 = 50;
    /// Default second Canny threshold.
    pub const DEFAULT_CANNY_THRESHOLD2: i32 = 150;
    /// Default smallest dial radius.
    pub const DEFAULT_MIN_RADIUS: i32 = 281;
    /// Default largest dial radius.
    pub const DEFAULT_MAX_RADIUS: i32 = 377;
    /// Default minimum needle length.
    pub const DEFAULT_MIN_LINE_LENGTH: i32 = 50;
    /// Default maximum needle gap.
    pub const DEFAULT_MAX_LINE_GAP: i32 = 150;
    /// Default gauge minimum.
    pub const DEFAULT_GAUGE_MIN: f64 = 0.0;
    /// Default gauge maximum.
    pub const DEFAULT_GAUGE_MAX: f64 = 15.0;
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            quad_points: Self::DEFAULT_QUAD_POINTS,
            output_size: Dimensions {
                width: Self::DEFAULT_OUTPUT_WIDTH,
                height: Self::DEFAULT_OUTPUT_HEIGHT,
            },
            sigma_x: Self::DEFAULT_SIGMA,
            sigma_y: Self::DEFAULT_SIGMA,
            canny_threshold1: Self::DEFAULT_CANNY_THRESHOLD1,
            canny_threshold2: Self::DEFAULT_CANNY_THRESHOLD2,
            min_radius: Self::DEFAULT_MIN_RADIUS,
            max_radius: Self::DEFAULT_MAX_RADIUS,
            line_params: HoughLineParams::default(),
            gauge_min: Self::DEFAULT_GAUGE_MIN,
            gauge_max: Self::DEFAULT_GAUGE_MAX,
            convention: ReadingConvention::default(),
        }
    }
}

/// Outward notifications emitted by [`crate::GaugePipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A full or partial pipeline run finished.
    ProcessingCompleted,
    /// Loading an image failed; pipeline state is unchanged.
    ErrorOccurred {
        /// Human-readable description of the failure.
        message: String,
    },
}

/// Errors that can occur while loading a gauge photograph.
///
/// Stage inputs that are missing are not errors: the affected stages
/// are skipped silently.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The file could not be opened or decoded.
    #[error("failed to load image {}: {source}", path.display())]
    ImageLoad {
        /// The path that was requested.
        path: PathBuf,
        /// The underlying open/decode failure.
        #[source]
        source: image::ImageError,
    },

    /// In-memory image bytes could not be decoded.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn needle_length_and_endpoints() {
        let needle = DetectedNeedle::new(1, 2, 4, 6);
        assert_eq!(needle.start(), Point::new(1.0, 2.0));
        assert_eq!(needle.end(), Point::new(4.0, 6.0));
        assert!((needle.length() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dial_rounding_follows_nearest_integer() {
        let dial = DetectedDial {
            x: 10.4,
            y: 20.6,
            radius: 99.5,
        };
        assert_eq!(dial.rounded(), (10, 21, 100));
    }

    #[test]
    fn dial_rounding_sends_halves_to_even() {
        let dial = DetectedDial {
            x: 96.5,
            y: 97.5,
            radius: 62.5,
        };
        assert_eq!(dial.rounded(), (96, 98, 62));
    }

    #[test]
    fn default_config_matches_reference_gauge() {
        let config = GaugeConfig::default();
        assert_eq!(config.quad_points[0], Point::new(60.0, 41.0));
        assert_eq!(config.quad_points[3], Point::new(55.0, 582.0));
        assert_eq!(
            config.output_size,
            Dimensions {
                width: 613,
                height: 580
            }
        );
        assert_eq!(config.canny_threshold1, 50);
        assert_eq!(config.canny_threshold2, 150);
        assert_eq!((config.min_radius, config.max_radius), (281, 377));
        assert_eq!(config.line_params.threshold, 30);
        assert!((config.gauge_max - 15.0).abs() < f64::EPSILON);
        assert!((config.convention.rotation_deg - 270.0).abs() < f64::EPSILON);
        assert_eq!(config.convention.tip, TipRule::FartherFromCenter);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn config_json_roundtrip() {
        let config = GaugeConfig {
            sigma_x: 0.5,
            canny_threshold1: 200,
            canny_threshold2: 10,
            ..GaugeConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: GaugeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn load_error_names_the_path() {
        let err = PipelineError::ImageLoad {
            path: PathBuf::from("/nope/gauge.png"),
            source: image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "missing",
            )),
        };
        let msg = err.to_string();
        assert!(msg.contains("/nope/gauge.png"), "got {msg}");
    }
}
