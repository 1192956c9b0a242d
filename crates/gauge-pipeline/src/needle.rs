//! Needle localization via the probabilistic Hough line transform.
//!
//! The search is restricted to the square around the detected dial,
//! clipped to the edge map. Inside it, [`hough_lines_p`] extracts line
//! segments and the longest one is taken as the needle, in coordinates
//! local to that square.
//!
//! The transform visits edge pixels in a pseudo-random order drawn from
//! a fixed seed, so repeated runs on the same input give the same
//! segments.

use image::GrayImage;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{DetectedDial, DetectedNeedle};

/// Distance resolution of the needle search, in pixels.
pub const RHO: f64 = 1.0;
/// Angle resolution of the needle search, in radians (one degree).
pub const THETA: f64 = std::f64::consts::PI / 180.0;
/// Accumulator votes needed before a segment is traced.
pub const VOTE_THRESHOLD: u32 = 30;

/// Seed for the pixel visiting order.
const VISIT_SEED: u64 = 0xFFFF_FFFF;

/// Fractional bits of the fixed-point line walk.
const SHIFT: i32 = 16;

/// An axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width (may be non-positive when degenerate).
    pub width: i32,
    /// Height (may be non-positive when degenerate).
    pub height: i32,
}

impl Roi {
    /// The dial's bounding square `[x - r, y - r]` with side `2r`,
    /// intersected with a `width`×`height` image.
    ///
    /// An empty intersection comes back as an all-zero rectangle.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn around_dial(dial: DetectedDial, width: u32, height: u32) -> Self {
        let (x, y, r) = dial.rounded();
        let square = Self {
            x: x - r,
            y: y - r,
            width: 2 * r,
            height: 2 * r,
        };
        square.intersect(Self {
            x: 0,
            y: 0,
            width: width as i32,
            height: height as i32,
        })
    }

    /// Intersection of two rectangles; all-zero if they do not overlap.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        if x2 <= x1 || y2 <= y1 {
            return Self {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            };
        }
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Whether the rectangle covers no pixels.
    #[must_use]
    pub const fn is_degenerate(self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Outcome of a needle search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeedleSearch {
    /// The clipped dial square covers no pixels; nothing was searched.
    DegenerateRoi,
    /// The transform found no segment inside the region.
    NotFound(Roi),
    /// The longest segment, ROI-local, and the region it was found in.
    Found(Roi, DetectedNeedle),
}

/// Locate the needle inside the dial's bounding square.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn locate(
    edges: &GrayImage,
    dial: DetectedDial,
    min_line_length: i32,
    max_line_gap: i32,
) -> NeedleSearch {
    let roi = Roi::around_dial(dial, edges.width(), edges.height());
    if roi.is_degenerate() {
        return NeedleSearch::DegenerateRoi;
    }

    let patch = image::imageops::crop_imm(
        edges,
        roi.x as u32,
        roi.y as u32,
        roi.width as u32,
        roi.height as u32,
    )
    .to_image();
    let segments = hough_lines_p(
        &patch,
        RHO,
        THETA,
        VOTE_THRESHOLD,
        min_line_length,
        max_line_gap,
    );
    tracing::debug!(segments = segments.len(), ?roi, "line transform finished");

    longest(&segments).map_or(NeedleSearch::NotFound(roi), |needle| {
        NeedleSearch::Found(roi, needle)
    })
}

/// The longest segment; the first one wins among equal lengths.
#[must_use]
pub fn longest(segments: &[DetectedNeedle]) -> Option<DetectedNeedle> {
    let mut best: Option<(f64, DetectedNeedle)> = None;
    for &segment in segments {
        let length = segment.length();
        if best.is_none_or(|(best_length, _)| length > best_length) {
            best = Some((length, segment));
        }
    }
    best.map(|(_, segment)| segment)
}

/// Probabilistic Hough transform for line segments.
///
/// Non-zero pixels of `image` are visited in a seeded random order.
/// Each one votes for every quantized line through it; once some line
/// collects `threshold` votes, the walk along that line in both
/// directions collects the segment, tolerating runs of up to
/// `max_line_gap` missing pixels. The segment is reported when its x or
/// y extent reaches `min_line_length`, and its pixels stop voting.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::too_many_lines
)]
pub fn hough_lines_p(
    image: &GrayImage,
    rho: f64,
    theta: f64,
    threshold: u32,
    min_line_length: i32,
    max_line_gap: i32,
) -> Vec<DetectedNeedle> {
    let (width, height) = (image.width() as i32, image.height() as i32);
    if width == 0 || height == 0 || rho.is_nan() || rho <= 0.0 || theta.is_nan() || theta <= 0.0 {
        return Vec::new();
    }

    let irho = 1.0 / rho;
    let numangle = (std::f64::consts::PI / theta).round().max(1.0) as usize;
    let numrho = ((f64::from(width + height) * 2.0 + 1.0) / rho).round() as i32;
    let offset = (numrho - 1) / 2;
    let trig: Vec<(f64, f64)> = (0..numangle)
        .map(|n| {
            let angle = n as f64 * theta;
            (angle.cos() * irho, angle.sin() * irho)
        })
        .collect();

    let mut accum = vec![0u32; numangle * numrho as usize];
    let mut mask = GrayImage::new(image.width(), image.height());
    let mut remaining: Vec<(i32, i32)> = Vec::new();
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel.0[0] != 0 {
            mask.put_pixel(x, y, image::Luma([1]));
            remaining.push((x as i32, y as i32));
        }
    }

    let cell = |n: usize, x: i32, y: i32| -> usize {
        let (c, s) = trig[n];
        let r = f64::from(x).mul_add(c, f64::from(y) * s).round() as i32 + offset;
        n * numrho as usize + r as usize
    };
    let masked = |mask: &GrayImage, x: i32, y: i32| mask.get_pixel(x as u32, y as u32).0[0] != 0;

    let mut rng = StdRng::seed_from_u64(VISIT_SEED);
    let mut lines = Vec::new();

    while !remaining.is_empty() {
        // Take a random remaining point, filling its slot with the last one.
        let idx = rng.gen_range(0..remaining.len());
        let (j, i) = remaining.swap_remove(idx);

        // Already consumed by an earlier segment.
        if !masked(&mask, j, i) {
            continue;
        }

        // Vote, tracking the strongest line through this point.
        let mut max_val = threshold.saturating_sub(1);
        let mut max_n = 0;
        for n in 0..numangle {
            let slot = cell(n, j, i);
            accum[slot] += 1;
            if accum[slot] > max_val {
                max_val = accum[slot];
                max_n = n;
            }
        }
        if max_val < threshold {
            continue;
        }

        // Walk along the line direction in fixed point.
        let a = -trig[max_n].1;
        let b = trig[max_n].0;
        let (mut x0, mut y0) = (j, i);
        let (dx0, dy0, xflag) = if a.abs() > b.abs() {
            y0 = (y0 << SHIFT) + (1 << (SHIFT - 1));
            let step = (b * f64::from(1 << SHIFT) / a.abs()).round() as i32;
            (if a > 0.0 { 1 } else { -1 }, step, true)
        } else {
            x0 = (x0 << SHIFT) + (1 << (SHIFT - 1));
            let step = (a * f64::from(1 << SHIFT) / b.abs()).round() as i32;
            (step, if b > 0.0 { 1 } else { -1 }, false)
        };
        let to_pixel = |x: i32, y: i32| {
            if xflag { (x, y >> SHIFT) } else { (x >> SHIFT, y) }
        };
        let inside = |(px, py): (i32, i32)| px >= 0 && px < width && py >= 0 && py < height;

        let mut line_end = [(j, i); 2];
        for (k, end) in line_end.iter_mut().enumerate() {
            let (dx, dy) = if k == 0 { (dx0, dy0) } else { (-dx0, -dy0) };
            let (mut x, mut y) = (x0, y0);
            let mut gap = 0;
            loop {
                let p = to_pixel(x, y);
                if !inside(p) {
                    break;
                }
                if masked(&mask, p.0, p.1) {
                    gap = 0;
                    *end = p;
                } else {
                    gap += 1;
                    if gap > max_line_gap {
                        break;
                    }
                }
                x += dx;
                y += dy;
            }
        }

        let good_line = (line_end[1].0 - line_end[0].0).abs() >= min_line_length
            || (line_end[1].1 - line_end[0].1).abs() >= min_line_length;

        // Consume the walked pixels; a kept segment also withdraws its votes.
        for (k, &end) in line_end.iter().enumerate() {
            let (dx, dy) = if k == 0 { (dx0, dy0) } else { (-dx0, -dy0) };
            let (mut x, mut y) = (x0, y0);
            loop {
                let p = to_pixel(x, y);
                if !inside(p) {
                    break;
                }
                if masked(&mask, p.0, p.1) {
                    if good_line {
                        for n in 0..numangle {
                            let slot = cell(n, p.0, p.1);
                            accum[slot] = accum[slot].saturating_sub(1);
                        }
                    }
                    mask.put_pixel(p.0 as u32, p.1 as u32, image::Luma([0]));
                }
                if p == end {
                    break;
                }
                x += dx;
                y += dy;
            }
        }

        if good_line {
            lines.push(DetectedNeedle::new(
                line_end[0].0,
                line_end[0].1,
                line_end[1].0,
                line_end[1].1,
            ));
        }
    }
    lines
}
