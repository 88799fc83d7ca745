//! Pre-flight checks that decide whether a scan is worth processing.
//!
//! Four independent checks run on the luminance image: focus (Laplacian
//! variance), resolution (DPI from the pixel width over an assumed paper
//! width), contrast (intensity standard deviation) and grid detectability
//! (line count of a Hough pass on a coarse pyramid level). All four must pass.
use crate::edges::laplacian_variance;
use crate::image::ImageF32;
use crate::lines::HoughAccumulator;
use crate::morphology::binarize_auto;
use crate::pyramid::Pyramid;
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GateOptions {
    pub enabled: bool,
    /// Minimum Laplacian variance on the 0–255 scale.
    pub blur_threshold: f32,
    /// Assumed physical width of the scanned page (inches).
    pub paper_width_in: f32,
    pub min_dpi: f32,
    /// Minimum intensity standard deviation on the 0–255 scale.
    pub min_contrast_std: f32,
    pub min_grid_lines: usize,
    pub pyramid_levels: usize,
    /// Hough votes required per line, as a fraction of the shorter side.
    pub min_vote_fraction: f32,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            blur_threshold: 100.0,
            paper_width_in: 11.0,
            min_dpi: 100.0,
            min_contrast_std: 20.0,
            min_grid_lines: 10,
            pyramid_levels: 2,
            min_vote_fraction: 0.3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    Blur,
    Resolution,
    Contrast,
    GridDetectability,
}

impl GateKind {
    pub fn recommendation(self) -> &'static str {
        match self {
            GateKind::Blur => "image is blurred: rescan with the page flat and in focus",
            GateKind::Resolution => "resolution too low: rescan at a higher DPI",
            GateKind::Contrast => "contrast too low: apply contrast boost before digitizing",
            GateKind::GridDetectability => "grid lines not detectable: try FFT reconstruction",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateCheck {
    pub kind: GateKind,
    pub passed: bool,
    pub value: f64,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateReport {
    pub passed: bool,
    pub checks: Vec<GateCheck>,
    /// Recommendations of every failed check, joined with `"; "`.
    pub recommendation: Option<String>,
}

impl GateReport {
    pub fn failed(&self) -> impl Iterator<Item = &GateCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn check(&self, kind: GateKind) -> Option<&GateCheck> {
        self.checks.iter().find(|c| c.kind == kind)
    }
}

pub struct QualityGates {
    options: GateOptions,
}

impl QualityGates {
    pub fn new(options: GateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GateOptions {
        &self.options
    }

    pub fn check(&self, luma: &ImageF32) -> GateReport {
        let o = &self.options;
        let blur = laplacian_variance(luma) as f64;
        let dpi = luma.w as f64 / (o.paper_width_in.max(1e-3) as f64);
        let (_, std) = luma.mean_std();
        let contrast = std as f64 * 255.0;
        let lines = self.count_grid_lines(luma) as f64;

        let checks: Vec<GateCheck> = [
            (GateKind::Blur, blur, o.blur_threshold as f64),
            (GateKind::Resolution, dpi, o.min_dpi as f64),
            (GateKind::Contrast, contrast, o.min_contrast_std as f64),
            (GateKind::GridDetectability, lines, o.min_grid_lines as f64),
        ]
        .into_iter()
        .map(|(kind, value, threshold)| {
            let passed = value >= threshold;
            GateCheck {
                kind,
                passed,
                value,
                threshold,
                recommendation: (!passed).then(|| kind.recommendation().to_string()),
            }
        })
        .collect();

        let passed = checks.iter().all(|c| c.passed);
        let failed: Vec<&str> = checks
            .iter()
            .filter_map(|c| c.recommendation.as_deref())
            .collect();
        let recommendation = (!failed.is_empty()).then(|| failed.join("; "));
        debug!(
            "gates: blur={:.1} dpi={:.1} contrast={:.1} lines={}",
            blur, dpi, contrast, lines
        );
        if !passed {
            info!("quality gates failed: {}", failed.join("; "));
        }
        GateReport {
            passed,
            checks,
            recommendation,
        }
    }

    /// Hough line count on the coarsest pyramid level.
    pub fn count_grid_lines(&self, luma: &ImageF32) -> usize {
        if luma.w == 0 || luma.h == 0 {
            return 0;
        }
        let pyramid = Pyramid::build(luma, self.options.pyramid_levels);
        let coarse = pyramid.coarsest();
        let mask = binarize_auto(coarse, None);
        if mask.count() == 0 {
            return 0;
        }
        let mut acc = HoughAccumulator::new(coarse.w, coarse.h, 15.0);
        acc.accumulate(&mask);
        let min_votes =
            ((coarse.w.min(coarse.h) as f32 * self.options.min_vote_fraction).round() as u32).max(10);
        acc.peaks(min_votes, 1, 2.0).len()
    }
}
