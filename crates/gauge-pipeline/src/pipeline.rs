//! The stateful gauge reading pipeline.
//!
//! [`GaugePipeline`] owns the source photograph, every stage image and
//! the retained detections. Setters store a parameter and re-run the
//! stage it belongs to plus everything downstream through
//! [`GaugePipeline::recompute_from`]:
//!
//! ```rust
//! # use gauge_pipeline::{GaugePipeline, PipelineError};
//! # fn run(png: &[u8]) -> Result<(), PipelineError> {
//! let mut pipeline = GaugePipeline::new();
//! pipeline.subscribe(|event| println!("{event:?}"));
//! pipeline.load_image_from_memory(png)?;
//! pipeline.set_canny_thresholds(40, 120);
//! if let Some(reading) = pipeline.reading() {
//!     println!("{reading:.2}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! A stage whose input image is missing is skipped and keeps its
//! previous output. The dial and needle are only replaced by a
//! non-empty detector result, so a run that finds nothing leaves the
//! last detection in place.

use std::fmt;
use std::path::Path;

use crate::needle::{NeedleSearch, Roi};
use crate::stage::Stage;
use crate::types::{
    DetectedDial, DetectedNeedle, Dimensions, GaugeConfig, GrayImage, HoughLineParams,
    PipelineError, PipelineEvent, Point, ReadingConvention, RgbImage,
};

type Subscriber = Box<dyn FnMut(&PipelineEvent)>;

/// Gauge reading pipeline state.
pub struct GaugePipeline {
    config: GaugeConfig,
    source: Option<RgbImage>,
    rectified: Option<RgbImage>,
    gray: Option<GrayImage>,
    blurred: Option<GrayImage>,
    edges: Option<GrayImage>,
    dial_overlay: Option<RgbImage>,
    needle_overlay: Option<RgbImage>,
    dial: Option<DetectedDial>,
    needle: Option<DetectedNeedle>,
    roi: Option<Roi>,
    reading: Option<f64>,
    subscribers: Vec<Subscriber>,
}

impl Default for GaugePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GaugePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaugePipeline")
            .field("config", &self.config)
            .field("source", &self.image_dimensions())
            .field("dial", &self.dial)
            .field("needle", &self.needle)
            .field("reading", &self.reading)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl GaugePipeline {
    /// An empty pipeline with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GaugeConfig::default())
    }

    /// An empty pipeline with the given configuration.
    #[must_use]
    pub const fn with_config(config: GaugeConfig) -> Self {
        Self {
            config,
            source: None,
            rectified: None,
            gray: None,
            blurred: None,
            edges: None,
            dial_overlay: None,
            needle_overlay: None,
            dial: None,
            needle: None,
            roi: None,
            reading: None,
            subscribers: Vec::new(),
        }
    }

    /// Register a callback for [`PipelineEvent`]s.
    pub fn subscribe(&mut self, callback: impl FnMut(&PipelineEvent) + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    fn emit(&mut self, event: &PipelineEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }

    // ───────────────────────────── Loading ─────────────────────────────

    /// Load a photograph from disk and run the whole pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageLoad`] if the file cannot be opened
    /// or decoded. An [`PipelineEvent::ErrorOccurred`] is emitted first
    /// and no state is changed.
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let loaded = crate::grayscale::open(path);
        self.accept_source(loaded)?;
        tracing::info!(path = %path.display(), "image loaded");
        self.process_all();
        Ok(())
    }

    /// Decode an in-memory photograph and run the whole pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] for an empty buffer and
    /// [`PipelineError::ImageDecode`] for undecodable data, after
    /// emitting [`PipelineEvent::ErrorOccurred`]. No state is changed.
    pub fn load_image_from_memory(&mut self, bytes: &[u8]) -> Result<(), PipelineError> {
        let loaded = crate::grayscale::decode(bytes);
        self.accept_source(loaded)?;
        tracing::info!(bytes = bytes.len(), "image decoded");
        self.process_all();
        Ok(())
    }

    fn accept_source(
        &mut self,
        loaded: Result<RgbImage, PipelineError>,
    ) -> Result<(), PipelineError> {
        match loaded {
            Ok(image) => {
                self.source = Some(image);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "image load failed");
                self.emit(&PipelineEvent::ErrorOccurred {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Whether a source photograph is loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.source.is_some()
    }

    // ─────────────────────────── Recompute ─────────────────────────────

    /// Run every stage from rectification on. No-op without an image.
    pub fn process_all(&mut self) {
        if self.is_loaded() {
            self.recompute_from(Stage::Rectify);
        }
    }

    /// Re-run `stage` and every stage after it, then emit
    /// [`PipelineEvent::ProcessingCompleted`].
    pub fn recompute_from(&mut self, stage: Stage) {
        for &step in stage.cascade() {
            match step {
                Stage::Rectify => self.run_rectify(),
                Stage::Grayscale => self.run_grayscale(),
                Stage::Blur => self.run_blur(),
                Stage::Edges => self.run_edges(),
                Stage::Dial => self.run_dial(),
                Stage::Needle => self.run_needle(),
                Stage::Reading => self.run_reading(),
            }
        }
        tracing::info!(from = %stage, reading = ?self.reading, "processing completed");
        self.emit(&PipelineEvent::ProcessingCompleted);
    }

    /// Recompute from `stage` only when an image is loaded.
    fn recompute_if_loaded(&mut self, stage: Stage) {
        if self.is_loaded() {
            self.recompute_from(stage);
        }
    }

    fn run_rectify(&mut self) {
        let Some(source) = &self.source else { return };
        if let Some(rectified) =
            crate::rectify::rectify(source, &self.config.quad_points, self.config.output_size)
        {
            tracing::debug!(
                width = rectified.width(),
                height = rectified.height(),
                "rectified"
            );
            self.rectified = Some(rectified);
        }
    }

    fn run_grayscale(&mut self) {
        if let Some(gray) = self.rectified.as_ref().and_then(crate::grayscale::to_gray) {
            self.gray = Some(gray);
        }
    }

    fn run_blur(&mut self) {
        let Some(gray) = &self.gray else { return };
        if let Some(blurred) =
            crate::blur::gaussian_blur(gray, self.config.sigma_x, self.config.sigma_y)
        {
            self.blurred = Some(blurred);
        }
    }

    fn run_edges(&mut self) {
        let Some(blurred) = &self.blurred else { return };
        if let Some(edges) = crate::edge::detect(
            blurred,
            self.config.canny_threshold1,
            self.config.canny_threshold2,
        ) {
            self.edges = Some(edges);
        }
    }

    fn run_dial(&mut self) {
        let Some(edges) = &self.edges else { return };
        match crate::dial::locate(edges, self.config.min_radius, self.config.max_radius) {
            Some(dial) => {
                tracing::debug!(x = dial.x, y = dial.y, radius = dial.radius, "dial found");
                self.dial = Some(dial);
            }
            None => tracing::warn!(kept = ?self.dial, "no dial found, keeping previous"),
        }
        if let (Some(dial), Some(rectified)) = (self.dial, &self.rectified) {
            self.dial_overlay = Some(crate::overlay::draw_dial(rectified, dial));
        }
    }

    fn run_needle(&mut self) {
        let (Some(edges), Some(dial)) = (&self.edges, self.dial) else {
            return;
        };
        let lines = self.config.line_params;
        match crate::needle::locate(edges, dial, lines.min_line_length, lines.max_line_gap) {
            NeedleSearch::DegenerateRoi => {
                tracing::warn!(?dial, "dial region lies outside the image");
            }
            NeedleSearch::NotFound(roi) => {
                tracing::warn!(?roi, kept = ?self.needle, "no needle found, keeping previous");
            }
            NeedleSearch::Found(roi, needle) => {
                tracing::debug!(?needle, length = needle.length(), "needle found");
                self.needle = Some(needle);
                self.roi = Some(roi);
                if let Some(base) = &self.dial_overlay {
                    self.needle_overlay = Some(crate::overlay::draw_needle(base, roi, needle));
                }
            }
        }
    }

    fn run_reading(&mut self) {
        if let (Some(dial), Some(needle)) = (self.dial, self.needle) {
            self.reading = Some(crate::reader::analyze(
                dial,
                needle,
                self.config.gauge_min,
                self.config.gauge_max,
                self.config.convention,
            ));
        }
    }

    // ──────────────────────────── Setters ──────────────────────────────

    /// Replace the perspective quad (TL, TR, BR, BL).
    ///
    /// Anything other than exactly four points is ignored and `false`
    /// is returned.
    pub fn set_perspective_points(&mut self, points: &[Point]) -> bool {
        let Ok(quad) = <[Point; 4]>::try_from(points) else {
            tracing::warn!(count = points.len(), "perspective quad needs exactly 4 points");
            return false;
        };
        self.config.quad_points = quad;
        self.recompute_if_loaded(Stage::Rectify);
        true
    }

    /// Set the rectified image size.
    pub fn set_output_size(&mut self, width: u32, height: u32) {
        self.config.output_size = Dimensions { width, height };
        self.recompute_if_loaded(Stage::Rectify);
    }

    /// Set the Gaussian sigma per axis.
    pub fn set_gaussian_sigma(&mut self, sigma_x: f64, sigma_y: f64) {
        self.config.sigma_x = sigma_x;
        self.config.sigma_y = sigma_y;
        self.recompute_if_loaded(Stage::Blur);
    }

    /// Set the two edge thresholds, in any order.
    pub fn set_canny_thresholds(&mut self, threshold1: i32, threshold2: i32) {
        self.config.canny_threshold1 = threshold1;
        self.config.canny_threshold2 = threshold2;
        self.recompute_if_loaded(Stage::Edges);
    }

    /// Set the searched dial radius range.
    pub fn set_hough_circle_params(&mut self, min_radius: i32, max_radius: i32) {
        self.config.min_radius = min_radius;
        self.config.max_radius = max_radius;
        self.recompute_if_loaded(Stage::Dial);
    }

    /// Set the line transform parameters.
    ///
    /// Only the length and gap affect the needle search; see
    /// [`HoughLineParams`].
    pub fn set_hough_line_params(&mut self, params: HoughLineParams) {
        self.config.line_params = params;
        self.recompute_if_loaded(Stage::Needle);
    }

    /// Set the calibrated value range.
    ///
    /// Unlike the other setters this always recomputes the reading and
    /// notifies, even with no image loaded.
    pub fn set_gauge_range(&mut self, min_value: f64, max_value: f64) {
        self.config.gauge_min = min_value;
        self.config.gauge_max = max_value;
        self.recompute_from(Stage::Reading);
    }

    /// Set the angle-to-value convention.
    pub fn set_reading_convention(&mut self, convention: ReadingConvention) {
        self.config.convention = convention;
        self.recompute_if_loaded(Stage::Reading);
    }

    /// Replace the whole configuration and re-run everything.
    pub fn set_config(&mut self, config: GaugeConfig) {
        self.config = config;
        self.process_all();
    }

    // ──────────────────────────── Getters ──────────────────────────────

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &GaugeConfig {
        &self.config
    }

    /// The loaded photograph.
    #[must_use]
    pub const fn source_image(&self) -> Option<&RgbImage> {
        self.source.as_ref()
    }

    /// Pixel dimensions of the loaded photograph.
    #[must_use]
    pub fn image_dimensions(&self) -> Option<Dimensions> {
        self.source.as_ref().map(|image| Dimensions {
            width: image.width(),
            height: image.height(),
        })
    }

    /// Perspective-corrected view.
    #[must_use]
    pub const fn rectified_image(&self) -> Option<&RgbImage> {
        self.rectified.as_ref()
    }

    /// Luma image of the rectified view.
    #[must_use]
    pub const fn gray_image(&self) -> Option<&GrayImage> {
        self.gray.as_ref()
    }

    /// Blurred luma image.
    #[must_use]
    pub const fn blurred_image(&self) -> Option<&GrayImage> {
        self.blurred.as_ref()
    }

    /// Binary edge map.
    #[must_use]
    pub const fn edges_image(&self) -> Option<&GrayImage> {
        self.edges.as_ref()
    }

    /// Rectified view with the dial drawn on it.
    #[must_use]
    pub const fn dial_image(&self) -> Option<&RgbImage> {
        self.dial_overlay.as_ref()
    }

    /// Dial overlay with the search region and needle drawn on it.
    #[must_use]
    pub const fn needle_image(&self) -> Option<&RgbImage> {
        self.needle_overlay.as_ref()
    }

    /// The retained dial.
    #[must_use]
    pub const fn dial(&self) -> Option<DetectedDial> {
        self.dial
    }

    /// The retained needle, in coordinates local to [`Self::needle_roi`].
    #[must_use]
    pub const fn needle(&self) -> Option<DetectedNeedle> {
        self.needle
    }

    /// Region the retained needle was found in.
    #[must_use]
    pub const fn needle_roi(&self) -> Option<Roi> {
        self.roi
    }

    /// The latest reading; `None` until a needle has been found.
    #[must_use]
    pub const fn reading(&self) -> Option<f64> {
        self.reading
    }

    /// Color image produced by `stage`, if any.
    ///
    /// Grayscale stages are expanded to RGB.
    #[must_use]
    pub fn stage_image(&self, stage: Stage) -> Option<RgbImage> {
        let gray = |image: &GrayImage| image::DynamicImage::ImageLuma8(image.clone()).to_rgb8();
        match stage {
            Stage::Rectify => self.rectified.clone(),
            Stage::Grayscale => self.gray.as_ref().map(gray),
            Stage::Blur => self.blurred.as_ref().map(gray),
            Stage::Edges => self.edges.as_ref().map(gray),
            Stage::Dial => self.dial_overlay.clone(),
            Stage::Needle => self.needle_overlay.clone(),
            Stage::Reading => None,
        }
    }
}
