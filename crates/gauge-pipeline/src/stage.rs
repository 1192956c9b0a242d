//! Pipeline stage identifiers and cascade order.
//!
//! A parameter change invalidates its own [`Stage`] and every stage
//! after it in [`Stage::ALL`]; earlier stages keep their outputs.

use std::fmt;

/// One step of the gauge reading pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Perspective warp of the source into the output rectangle.
    Rectify,
    /// Luma conversion.
    Grayscale,
    /// 9×9 Gaussian blur.
    Blur,
    /// Dual-threshold edge map.
    Edges,
    /// Circle transform and dial overlay.
    Dial,
    /// Line-segment transform and needle overlay.
    Needle,
    /// Angle-to-value mapping.
    Reading,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Self; 7] = [
        Self::Rectify,
        Self::Grayscale,
        Self::Blur,
        Self::Edges,
        Self::Dial,
        Self::Needle,
        Self::Reading,
    ];

    /// Position of the stage in [`Stage::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Display label for the stage.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rectify => "Rectified",
            Self::Grayscale => "Grayscale",
            Self::Blur => "Blurred",
            Self::Edges => "Edges",
            Self::Dial => "Dial",
            Self::Needle => "Needle",
            Self::Reading => "Reading",
        }
    }

    /// File-name friendly identifier, used when saving stage images.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Rectify => "rectified",
            Self::Grayscale => "gray",
            Self::Blur => "blurred",
            Self::Edges => "edges",
            Self::Dial => "dial",
            Self::Needle => "needle",
            Self::Reading => "reading",
        }
    }

    /// Stages from `self` through the end of the pipeline.
    #[must_use]
    pub fn cascade(self) -> &'static [Self] {
        &Self::ALL[self.index()..]
    }

    /// Whether the stage produces an image.
    #[must_use]
    pub const fn has_image(self) -> bool {
        !matches!(self, Self::Reading)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_in_index_order() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i, "{stage} out of order");
        }
    }

    #[test]
    fn cascade_covers_downstream_only() {
        assert_eq!(Stage::Rectify.cascade(), &Stage::ALL);
        assert_eq!(
            Stage::Dial.cascade(),
            &[Stage::Dial, Stage::Needle, Stage::Reading]
        );
        assert_eq!(Stage::Reading.cascade(), &[Stage::Reading]);
    }

    #[test]
    fn ordering_follows_pipeline() {
        assert!(Stage::Rectify < Stage::Edges);
        assert!(Stage::Needle < Stage::Reading);
    }

    #[test]
    fn slugs_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for stage in Stage::ALL {
            assert!(seen.insert(stage.slug()), "duplicate slug for {stage}");
        }
    }

    #[test]
    fn only_reading_has_no_image() {
        let imageless: Vec<_> = Stage::ALL.into_iter().filter(|s| !s.has_image()).collect();
        assert_eq!(imageless, [Stage::Reading]);
    }

    #[test]
    fn display_uses_label() {
        assert_eq!(Stage::Blur.to_string(), "Blurred");
    }
}
