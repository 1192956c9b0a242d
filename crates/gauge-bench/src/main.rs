//! gauge-bench: CLI tool for reading a gauge photo and tuning parameters.
//!
//! Loads an image, applies the pipeline parameters given as flags (or
//! as a full `GaugeConfig` JSON string), runs every stage, and prints the
//! detected dial, needle and reading. Intermediate stage images can be
//! written out for inspection.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin gauge-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Set `RUST_LOG=debug` to see per-stage results.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use gauge_pipeline::{
    DetectedDial, DetectedNeedle, Dimensions, GaugeConfig, GaugePipeline, HoughLineParams,
    PipelineEvent, Point, ReadingConvention, Roi, Stage, TipRule,
};
use serde::Serialize;

/// Read an analog gauge from a photograph.
///
/// Runs perspective rectification, blur, edge detection, dial and needle
/// detection on the given image and prints the calibrated reading.
#[derive(Parser)]
#[command(name = "gauge-bench", version, allow_negative_numbers = true)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, TIFF, WebP).
    image_path: PathBuf,

    /// Perspective quad as 8 comma-separated numbers: TL, TR, BR, BL x,y pairs.
    #[arg(long, value_delimiter = ',')]
    points: Option<Vec<f64>>,

    /// Rectified image width.
    #[arg(long, default_value_t = GaugeConfig::DEFAULT_OUTPUT_WIDTH)]
    width: u32,

    /// Rectified image height.
    #[arg(long, default_value_t = GaugeConfig::DEFAULT_OUTPUT_HEIGHT)]
    height: u32,

    /// Gaussian sigma along x.
    #[arg(long, default_value_t = GaugeConfig::DEFAULT_SIGMA)]
    sigma_x: f64,

    /// Gaussian sigma along y.
    #[arg(long, default_value_t = GaugeConfig::DEFAULT_SIGMA)]
    sigma_y: f64,

    /// First Canny threshold.
    #[arg(long, default_value_t = GaugeConfig::DEFAULT_CANNY_THRESHOLD1)]
    canny1: i32,

    /// Second Canny threshold.
    #[arg(long, default_value_t = GaugeConfig::DEFAULT_CANNY_THRESHOLD2)]
    canny2: i32,

    /// Smallest dial radius searched.
    #[arg(long, default_value_t = GaugeConfig::DEFAULT_MIN_RADIUS)]
    min_radius: i32,

    /// Largest dial radius searched.
    #[arg(long, default_value_t = GaugeConfig::DEFAULT_MAX_RADIUS)]
    max_radius: i32,

    /// Minimum needle extent in pixels.
    #[arg(long, default_value_t = GaugeConfig::DEFAULT_MIN_LINE_LENGTH)]
    min_line_length: i32,

    /// Maximum gap bridged along the needle.
    #[arg(long, default_value_t = GaugeConfig::DEFAULT_MAX_LINE_GAP)]
    max_line_gap: i32,

    /// Value at the gauge minimum.
    #[arg(long, default_value_t = GaugeConfig::DEFAULT_GAUGE_MIN)]
    gauge_min: f64,

    /// Value at the gauge maximum.
    #[arg(long, default_value_t = GaugeConfig::DEFAULT_GAUGE_MAX)]
    gauge_max: f64,

    /// Degrees added to the needle angle before mapping to a value.
    #[arg(long, default_value_t = ReadingConvention::DEFAULT_ROTATION_DEG)]
    rotation: f64,

    /// Which needle endpoint is the tip.
    #[arg(long, value_enum, default_value_t = Tip::Farther)]
    tip: Tip,

    /// Write every stage image as PNG into this directory.
    #[arg(long)]
    stages_dir: Option<PathBuf>,

    /// Output the result as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `GaugeConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Tip selection rule.
#[derive(Clone, Copy, ValueEnum)]
enum Tip {
    /// The endpoint farther from the dial center.
    Farther,
    /// The endpoint nearer the dial center.
    Nearer,
}

/// Build a [`GaugeConfig`] from CLI arguments.
///
/// `--config-json` wins over every individual flag.
fn config_from_cli(cli: &Cli) -> Result<GaugeConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let quad_points = match cli.points.as_deref() {
        None => GaugeConfig::DEFAULT_QUAD_POINTS,
        Some(&[x0, y0, x1, y1, x2, y2, x3, y3]) => [
            Point::new(x0, y0),
            Point::new(x1, y1),
            Point::new(x2, y2),
            Point::new(x3, y3),
        ],
        Some(other) => {
            return Err(format!(
                "--points needs 8 numbers, got {}",
                other.len()
            ));
        }
    };

    Ok(GaugeConfig {
        quad_points,
        output_size: Dimensions {
            width: cli.width,
            height: cli.height,
        },
        sigma_x: cli.sigma_x,
        sigma_y: cli.sigma_y,
        canny_threshold1: cli.canny1,
        canny_threshold2: cli.canny2,
        min_radius: cli.min_radius,
        max_radius: cli.max_radius,
        line_params: HoughLineParams {
            min_line_length: cli.min_line_length,
            max_line_gap: cli.max_line_gap,
            ..HoughLineParams::default()
        },
        gauge_min: cli.gauge_min,
        gauge_max: cli.gauge_max,
        convention: ReadingConvention {
            rotation_deg: cli.rotation,
            tip: match cli.tip {
                Tip::Farther => TipRule::FartherFromCenter,
                Tip::Nearer => TipRule::NearerToCenter,
            },
        },
    })
}

/// Everything the run found, for `--json`.
#[derive(Serialize)]
struct Report<'a> {
    image: &'a Path,
    dimensions: Option<Dimensions>,
    dial: Option<DetectedDial>,
    needle: Option<DetectedNeedle>,
    needle_roi: Option<Roi>,
    reading: Option<f64>,
    duration_ms: f64,
}

impl Report<'_> {
    fn print_human(&self) {
        match self.dimensions {
            Some(d) => println!("Image:    {} ({}x{})", self.image.display(), d.width, d.height),
            None => println!("Image:    {}", self.image.display()),
        }
        match self.dial {
            Some(d) => println!(
                "Dial:     center ({:.1}, {:.1}) radius {:.1}",
                d.x, d.y, d.radius
            ),
            None => println!("Dial:     not found"),
        }
        match (self.needle, self.needle_roi) {
            (Some(n), Some(roi)) => println!(
                "Needle:   ({}, {}) -> ({}, {}) in ROI at ({}, {}), length {:.1}",
                n.x1,
                n.y1,
                n.x2,
                n.y2,
                roi.x,
                roi.y,
                n.length()
            ),
            _ => println!("Needle:   not found"),
        }
        match self.reading {
            Some(r) => println!("Reading:  {r:.3}"),
            None => println!("Reading:  undefined"),
        }
        println!("Duration: {:.3}ms", self.duration_ms);
    }
}

/// Save every stage image as `<index>-<slug>.png` under `dir`.
fn write_stage_images(pipeline: &GaugePipeline, dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("Error creating {}: {e}", dir.display()))?;
    for stage in Stage::ALL {
        let Some(image) = pipeline.stage_image(stage) else {
            continue;
        };
        let path = dir.join(format!("{}-{}.png", stage.index(), stage.slug()));
        image
            .save(&path)
            .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
        eprintln!("{stage} image written to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(?config, "configuration");

    let mut pipeline = GaugePipeline::with_config(config);
    pipeline.subscribe(|event| match event {
        PipelineEvent::ProcessingCompleted => tracing::debug!("pipeline run finished"),
        PipelineEvent::ErrorOccurred { message } => tracing::error!(%message, "pipeline error"),
    });

    let start = Instant::now();
    if let Err(e) = pipeline.load_image(&cli.image_path) {
        eprintln!("Pipeline error: {e}");
        return ExitCode::FAILURE;
    }
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    if let Some(ref dir) = cli.stages_dir
        && let Err(msg) = write_stage_images(&pipeline, dir)
    {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }

    let report = Report {
        image: &cli.image_path,
        dimensions: pipeline.image_dimensions(),
        dial: pipeline.dial(),
        needle: pipeline.needle(),
        needle_roi: pipeline.needle_roi(),
        reading: pipeline.reading(),
        duration_ms,
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        report.print_human();
    }

    if report.reading.is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
