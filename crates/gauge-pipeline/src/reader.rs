//! Needle angle to calibrated reading.
//!
//! Angles are in degrees, measured from the 3 o'clock direction and
//! increasing counter-clockwise on screen (the image y axis points
//! down, so `atan2` is taken on the flipped y difference).

use crate::types::{DetectedDial, DetectedNeedle, Point, ReadingConvention, TipRule};

/// The needle endpoint taken as the tip.
///
/// With [`TipRule::FartherFromCenter`], `end` is the tip when `start`
/// is strictly nearer to `center`; otherwise `start` is. Equal
/// distances therefore pick `start`.
#[must_use]
pub fn tip(center: Point, needle: DetectedNeedle, rule: TipRule) -> Point {
    let (start, end) = (needle.start(), needle.end());
    let d_start = center.distance_squared(start);
    let d_end = center.distance_squared(end);
    match rule {
        TipRule::FartherFromCenter => {
            if d_start < d_end {
                end
            } else {
                start
            }
        }
        TipRule::NearerToCenter => {
            if d_end < d_start {
                end
            } else {
                start
            }
        }
    }
}

/// Angle of `tip` around `center`, in `[0, 360)` degrees.
#[must_use]
pub fn needle_angle(center: Point, tip: Point) -> f64 {
    let angle = (center.y - tip.y).atan2(tip.x - center.x).to_degrees();
    if angle < 0.0 { angle + 360.0 } else { angle }
}

/// Map an angle to a reading with the default 270° rotation.
///
/// `calculate_reading(90.0, 0.0, 15.0)` is `0.0`; `calculate_reading(0.0,
/// 0.0, 15.0)` is `11.25`. The result is not clamped to the range.
#[must_use]
pub fn calculate_reading(angle: f64, min_value: f64, max_value: f64) -> f64 {
    reading_with_rotation(
        angle,
        min_value,
        max_value,
        ReadingConvention::DEFAULT_ROTATION_DEG,
    )
}

/// Map an angle to a reading after rotating it by `rotation_deg`.
#[must_use]
pub fn reading_with_rotation(angle: f64, min_value: f64, max_value: f64, rotation_deg: f64) -> f64 {
    let adjusted = (angle + rotation_deg) % 360.0;
    (adjusted / 360.0).mul_add(max_value - min_value, min_value)
}

/// Reading for a needle found in the dial's region of interest.
///
/// The center is the ROI-local point `(radius, radius)`, matching the
/// coordinates the needle is stored in.
#[must_use]
pub fn analyze(
    dial: DetectedDial,
    needle: DetectedNeedle,
    min_value: f64,
    max_value: f64,
    convention: ReadingConvention,
) -> f64 {
    let (_, _, radius) = dial.rounded();
    let center = Point::new(f64::from(radius), f64::from(radius));
    let tip = tip(center, needle, convention.tip);
    let angle = needle_angle(center, tip);
    let reading = reading_with_rotation(angle, min_value, max_value, convention.rotation_deg);
    tracing::debug!(angle, reading, ?tip, "needle analyzed");
    reading
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn reading_laws() {
        assert!(close(calculate_reading(90.0, 0.0, 15.0), 0.0));
        assert!(close(calculate_reading(0.0, 0.0, 15.0), 11.25));
        assert!(close(calculate_reading(180.0, -5.0, 10.0), -1.25));
    }

    #[test]
    fn reading_is_not_clamped() {
        // 89 degrees sits just below the wrap point.
        let r = calculate_reading(89.0, 0.0, 15.0);
        assert!(r > 14.9 && r < 15.0, "got {r}");
    }

    #[test]
    fn custom_rotation() {
        assert!(close(reading_with_rotation(0.0, 0.0, 360.0, 0.0), 0.0));
        assert!(close(reading_with_rotation(45.0, 0.0, 360.0, 0.0), 45.0));
        assert!(close(reading_with_rotation(300.0, 0.0, 360.0, 90.0), 30.0));
    }

    #[test]
    fn angle_quadrants() {
        let c = Point::new(10.0, 10.0);
        assert!(close(needle_angle(c, Point::new(20.0, 10.0)), 0.0));
        // Up on screen is 90 degrees.
        assert!(close(needle_angle(c, Point::new(10.0, 0.0)), 90.0));
        assert!(close(needle_angle(c, Point::new(0.0, 10.0)), 180.0));
        assert!(close(needle_angle(c, Point::new(10.0, 20.0)), 270.0));
        let a = needle_angle(c, Point::new(20.0, 20.0));
        assert!(close(a, 315.0), "got {a}");
    }

    #[test]
    fn farther_endpoint_is_tip() {
        let c = Point::new(0.0, 0.0);
        let needle = DetectedNeedle::new(1, 0, 10, 0);
        assert_eq!(tip(c, needle, TipRule::FartherFromCenter), Point::new(10.0, 0.0));
        let reversed = DetectedNeedle::new(10, 0, 1, 0);
        assert_eq!(tip(c, reversed, TipRule::FartherFromCenter), Point::new(10.0, 0.0));
    }

    #[test]
    fn equidistant_endpoints_pick_first() {
        let c = Point::new(0.0, 0.0);
        let needle = DetectedNeedle::new(-5, 0, 5, 0);
        assert_eq!(tip(c, needle, TipRule::FartherFromCenter), Point::new(-5.0, 0.0));
        assert_eq!(tip(c, needle, TipRule::NearerToCenter), Point::new(-5.0, 0.0));
    }

    #[test]
    fn nearer_rule_inverts_choice() {
        let c = Point::new(0.0, 0.0);
        let needle = DetectedNeedle::new(1, 0, 10, 0);
        assert_eq!(tip(c, needle, TipRule::NearerToCenter), Point::new(1.0, 0.0));
    }

    #[test]
    fn analyze_uses_roi_local_center() {
        // Dial radius 50: center (50, 50) in ROI coordinates. The dial's
        // image position does not matter.
        let dial = DetectedDial {
            x: 300.0,
            y: 200.0,
            radius: 50.0,
        };
        // Needle pointing straight up: angle 90, reading = min.
        let up = DetectedNeedle::new(50, 45, 50, 5);
        assert!(close(
            analyze(dial, up, 0.0, 15.0, ReadingConvention::default()),
            0.0
        ));
        // Pointing right: angle 0, reading 11.25.
        let right = DetectedNeedle::new(55, 50, 95, 50);
        assert!(close(
            analyze(dial, right, 0.0, 15.0, ReadingConvention::default()),
            11.25
        ));
    }
}
