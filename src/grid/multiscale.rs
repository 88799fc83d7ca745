//! Two-pass grid detection: 1 mm fine lines and 5 mm bold lines.
//!
//! The fine pass keeps every dark run at least `fine_kernel` pixels long in
//! either direction. The bold pass first requires `bold_thickness` pixels
//! across the line, then `bold_kernel` pixels along it, which removes the
//! one-pixel fine lines. Both passes run the same finder → fitter →
//! oscillation chain; the ratio of their line counts should be close to 5.
use super::calibration::{line_spacing, SpacingRule};
use super::{DetectionMethod, GridDetection};
use crate::angle::Orientation;
use crate::fit::{
    FitOptions, GridLine, OscillationOptions, OscillationValidator, PolynomialLineFitter,
};
use crate::image::{BinaryMask, ImageF32};
use crate::lines::{GridLineFinder, LineFinderOptions};
use crate::morphology::{binarize_auto, open_horizontal, open_vertical};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiScaleOptions {
    /// Line element length (pixels) of the fine pass.
    pub fine_kernel: usize,
    /// Line element length (pixels) of the bold pass.
    pub bold_kernel: usize,
    /// Minimum cross-line thickness (pixels) of a bold line.
    pub bold_thickness: usize,
    pub expected_ratio: f64,
    /// Accepted relative deviation from `expected_ratio`.
    pub ratio_tolerance: f64,
}

impl Default for MultiScaleOptions {
    fn default() -> Self {
        Self {
            fine_kernel: 15,
            bold_kernel: 41,
            bold_thickness: 2,
            expected_ratio: 5.0,
            ratio_tolerance: 0.15,
        }
    }
}

/// Finder → fitter → oscillation check on one binary mask.
pub struct LineExtractor {
    finder: GridLineFinder,
    fitter: PolynomialLineFitter,
    validator: OscillationValidator,
}

/// Fitted lines of one mask.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedLines {
    pub horizontal: Vec<GridLine>,
    pub vertical: Vec<GridLine>,
    pub segments: usize,
    pub demoted: usize,
}

impl ExtractedLines {
    pub fn count(&self) -> usize {
        self.horizontal.len() + self.vertical.len()
    }
}

impl LineExtractor {
    pub fn new(finder: LineFinderOptions, fit: FitOptions, oscillation: OscillationOptions) -> Self {
        Self {
            finder: GridLineFinder::new(finder),
            fitter: PolynomialLineFitter::new(fit),
            validator: OscillationValidator::new(oscillation),
        }
    }

    pub fn finder(&self) -> &GridLineFinder {
        &self.finder
    }

    pub fn extract(&self, mask: &BinaryMask) -> ExtractedLines {
        let found = self.finder.find(mask);
        let mut out = ExtractedLines {
            segments: found.segments.len(),
            ..Default::default()
        };
        for orientation in [Orientation::Horizontal, Orientation::Vertical] {
            let fitted = self.fitter.fit_all(found.clusters(orientation));
            let (mut lines, demoted) = self.validator.validate_all(fitted);
            lines.sort_by(|a, b| a.position().total_cmp(&b.position()));
            out.demoted += demoted;
            match orientation {
                Orientation::Horizontal => out.horizontal = lines,
                Orientation::Vertical => out.vertical = lines,
            }
        }
        out
    }
}

/// Fine/bold count check.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioCheck {
    pub fine_count: usize,
    pub bold_count: usize,
    pub ratio: Option<f64>,
    pub passed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiScaleResult {
    pub fine: ExtractedLines,
    pub bold: ExtractedLines,
    pub ratio: RatioCheck,
    pub spacing_x: Option<f64>,
    pub spacing_y: Option<f64>,
}

impl MultiScaleResult {
    /// Collapse into a detection tagged with `method`; the fine pass holds
    /// every grid line.
    pub fn into_detection(self, method: DetectionMethod) -> GridDetection {
        GridDetection {
            method,
            demoted_lines: self.fine.demoted,
            bold_lines: self.bold.count(),
            horizontal: self.fine.horizontal,
            vertical: self.fine.vertical,
            spacing_x: self.spacing_x,
            spacing_y: self.spacing_y,
            validation_passed: self.ratio.passed,
        }
    }
}

pub struct MultiScaleGridDetector {
    options: MultiScaleOptions,
    binarize_threshold: Option<f32>,
    spacing: SpacingRule,
    extractor: LineExtractor,
}

impl MultiScaleGridDetector {
    pub fn new(
        options: MultiScaleOptions,
        finder: LineFinderOptions,
        fit: FitOptions,
        oscillation: OscillationOptions,
    ) -> Self {
        Self {
            options,
            binarize_threshold: finder.binarize_threshold,
            spacing: SpacingRule::default(),
            extractor: LineExtractor::new(finder, fit, oscillation),
        }
    }

    /// Rule used for the raw line-spacing estimate.
    pub fn with_spacing_rule(mut self, rule: SpacingRule) -> Self {
        self.spacing = rule;
        self
    }

    pub fn spacing_rule(&self) -> SpacingRule {
        self.spacing
    }

    pub fn detect(&self, img: &ImageF32) -> MultiScaleResult {
        let mask = binarize_auto(img, self.binarize_threshold);
        self.detect_mask(&mask)
    }

    pub fn detect_mask(&self, mask: &BinaryMask) -> MultiScaleResult {
        let (fine_mask, bold_mask) = self.pass_masks(mask);
        let fine = self.extractor.extract(&fine_mask);
        let bold = self.extractor.extract(&bold_mask);
        let ratio = self.ratio_check(fine.count(), bold.count());
        let spacing_x = line_spacing(&fine.vertical, self.spacing);
        let spacing_y = line_spacing(&fine.horizontal, self.spacing);
        debug!(
            "multiscale: fine={} (h={} v={}) bold={} ratio={:?} passed={}",
            fine.count(),
            fine.horizontal.len(),
            fine.vertical.len(),
            bold.count(),
            ratio.ratio,
            ratio.passed
        );
        MultiScaleResult {
            fine,
            bold,
            ratio,
            spacing_x,
            spacing_y,
        }
    }

    /// Filtered masks of the fine and bold passes.
    pub fn pass_masks(&self, mask: &BinaryMask) -> (BinaryMask, BinaryMask) {
        let o = &self.options;
        let fine = open_horizontal(mask, o.fine_kernel).union(&open_vertical(mask, o.fine_kernel));
        let bold_h = open_horizontal(&open_vertical(mask, o.bold_thickness), o.bold_kernel);
        let bold_v = open_vertical(&open_horizontal(mask, o.bold_thickness), o.bold_kernel);
        (fine, bold_h.union(&bold_v))
    }

    pub fn ratio_check(&self, fine_count: usize, bold_count: usize) -> RatioCheck {
        let ratio = (bold_count > 0).then(|| fine_count as f64 / bold_count as f64);
        let expected = self.options.expected_ratio;
        let passed = ratio.map_or(false, |r| {
            expected > 0.0 && (r - expected).abs() / expected <= self.options.ratio_tolerance
        });
        RatioCheck {
            fine_count,
            bold_count,
            ratio,
            passed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> MultiScaleGridDetector {
        MultiScaleGridDetector::new(
            MultiScaleOptions::default(),
            LineFinderOptions::default(),
            FitOptions::default(),
            OscillationOptions::default(),
        )
    }

    /// Fine lines every 8 px at `4 + 8i`, every fifth line 3 px thick.
    fn grid_mask(w: usize, h: usize) -> BinaryMask {
        let mut m = BinaryMask::new(w, h);
        for y in 0..h {
            for x in 0..w {
                if is_line(x) || is_line(y) {
                    m.set(x, y, true);
                }
            }
        }
        m
    }

    fn is_line(c: usize) -> bool {
        let i = ((c as f32 - 4.0) / 8.0).round().max(0.0) as usize;
        let d = c.abs_diff(4 + 8 * i);
        d == 0 || (i % 5 == 0 && d <= 1)
    }

    #[test]
    fn ratio_check_tolerance() {
        let d = detector();
        assert!(d.ratio_check(87, 18).passed);
        assert!(!d.ratio_check(40, 18).passed);
        let none = d.ratio_check(10, 0);
        assert!(none.ratio.is_none() && !none.passed);
    }

    #[test]
    fn crisp_grid_has_five_to_one_ratio() {
        let mask = grid_mask(400, 300);
        let result = detector().detect_mask(&mask);
        assert_eq!(result.fine.vertical.len(), 50);
        assert_eq!(result.fine.horizontal.len(), 37);
        assert_eq!(result.bold.count(), 18);
        assert!(result.ratio.passed, "{:?}", result.ratio);
        let sx = result.spacing_x.expect("x spacing");
        assert!((sx - 8.0).abs() < 0.5);
        assert!(result.fine.horizontal.iter().all(|l| l.order == 1));
    }
}
