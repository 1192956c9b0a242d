//! gauge-pipeline: Analog gauge reading from a photograph (sans-GUI).
//!
//! Turns a photo of a round dial into a calibrated value through:
//! perspective rectification -> grayscale -> blur -> edge detection ->
//! dial circle detection -> needle segment detection -> angle-to-value.
//!
//! [`GaugePipeline`] holds every stage output for display and re-runs
//! only the stages downstream of a changed parameter. The stage modules
//! are plain functions over `image` buffers and can be used directly.
//!
//! Viewers, parameter forms and file dialogs are left to the front end;
//! this crate only exposes setters, getters and [`PipelineEvent`]
//! notifications.

pub mod blur;
pub mod canny;
pub mod dial;
pub mod edge;
pub mod grayscale;
pub mod needle;
pub mod overlay;
pub mod pipeline;
pub mod reader;
pub mod rectify;
pub mod stage;
pub mod types;

pub use needle::Roi;
pub use pipeline::GaugePipeline;
pub use reader::calculate_reading;
pub use stage::Stage;
pub use types::{
    DetectedDial, DetectedNeedle, Dimensions, GaugeConfig, GrayImage, HoughLineParams,
    PipelineError, PipelineEvent, Point, QuadPoints, ReadingConvention, RgbImage, TipRule,
};
