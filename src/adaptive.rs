//! Three-tier grid detection with scored fallback.
//!
//! Tiers run in order: `Standard` (multi-scale detection on luminance),
//! `ContrastBoosted` (grid-emphasis channel plus percentile stretch) and
//! `Fft` (frequency-domain reconstruction). Each attempt is scored as
//! `count_weight · min(1, lines / target) + validation_weight · passed`.
//! The run stops at the first attempt scoring at least `good`; otherwise the
//! best attempt is returned with a warning, or tagged for manual review when
//! every attempt stays below `poor`.
use crate::grid::{
    detect_tiled, DetectionMethod, FftGridReconstructor, GridDetection, MultiScaleGridDetector,
    TilingOptions,
};
use crate::image::f32::percentile;
use crate::image::{ImageF32, RasterImage};
use crate::types::ProcessingStatus;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveOptions {
    pub excellent: f64,
    pub good: f64,
    /// Score at which an attempt counts as successful.
    pub acceptable: f64,
    pub poor: f64,
    pub target_line_count: usize,
    pub count_weight: f64,
    pub validation_weight: f64,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self {
            excellent: 0.9,
            good: 0.7,
            acceptable: 0.5,
            poor: 0.3,
            target_line_count: 40,
            count_weight: 0.7,
            validation_weight: 0.3,
        }
    }
}

/// One tier attempt, kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub method: DetectionMethod,
    pub detection: GridDetection,
    pub score: f64,
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveOutcome {
    /// Best attempt's grid.
    pub detection: GridDetection,
    pub score: f64,
    pub status: ProcessingStatus,
    pub attempts: Vec<AttemptRecord>,
}

impl AdaptiveOutcome {
    pub fn method(&self) -> DetectionMethod {
        self.detection.method
    }
}

pub const TIERS: [DetectionMethod; 3] = [
    DetectionMethod::Standard,
    DetectionMethod::ContrastBoosted,
    DetectionMethod::Fft,
];

pub struct AdaptiveProcessor {
    options: AdaptiveOptions,
    detector: MultiScaleGridDetector,
    fft: FftGridReconstructor,
    tiling: TilingOptions,
    merge_distance: f64,
}

impl AdaptiveProcessor {
    pub fn new(
        options: AdaptiveOptions,
        detector: MultiScaleGridDetector,
        fft: FftGridReconstructor,
    ) -> Self {
        Self {
            options,
            detector,
            fft,
            tiling: TilingOptions::default(),
            merge_distance: 4.0,
        }
    }

    /// Tile layout for the line-based tiers; only used when `multitile` is set.
    pub fn with_tiling(mut self, tiling: TilingOptions, merge_distance: f64) -> Self {
        self.tiling = tiling;
        self.merge_distance = merge_distance;
        self
    }

    pub fn options(&self) -> &AdaptiveOptions {
        &self.options
    }

    pub fn process(&self, image: &RasterImage) -> AdaptiveOutcome {
        let luma = image.luma();
        self.process_with_luma(image, &luma)
    }

    /// Same as [`process`](Self::process) with a precomputed luminance plane.
    pub fn process_with_luma(&self, image: &RasterImage, luma: &ImageF32) -> AdaptiveOutcome {
        let mut attempts: Vec<AttemptRecord> = Vec::with_capacity(TIERS.len());
        for method in TIERS {
            let detection = self.run_tier(method, image, luma);
            let score = self.score(&detection);
            let success = score >= self.options.acceptable;
            info!(
                "adaptive: tier {} -> {} lines, validation={}, score={:.3}",
                method.as_str(),
                detection.line_count(),
                detection.validation_passed,
                score
            );
            attempts.push(AttemptRecord {
                method,
                detection,
                score,
                success,
            });
            if score >= self.options.excellent {
                debug!("adaptive: excellent result, stopping at {}", method.as_str());
                break;
            }
            if score >= self.options.good {
                debug!("adaptive: good result, stopping at {}", method.as_str());
                break;
            }
        }

        let mut best = 0;
        for (i, a) in attempts.iter().enumerate() {
            if a.score > attempts[best].score {
                best = i;
            }
        }
        let score = attempts[best].score;
        let status = self.grade(score);
        match status {
            ProcessingStatus::Ok => {}
            ProcessingStatus::Warning => warn!(
                "adaptive: no tier reached {:.2}; best effort from {} (score {:.3})",
                self.options.good,
                attempts[best].method.as_str(),
                score
            ),
            ProcessingStatus::ManualReview => warn!(
                "adaptive: all tiers below {:.2}; {} (score {:.3}) needs manual review",
                self.options.poor,
                attempts[best].method.as_str(),
                score
            ),
        }
        AdaptiveOutcome {
            detection: attempts[best].detection.clone(),
            score,
            status,
            attempts,
        }
    }

    /// Grid detection of a single tier.
    pub fn run_tier(&self, method: DetectionMethod, image: &RasterImage, luma: &ImageF32) -> GridDetection {
        match method {
            DetectionMethod::Standard => self.detect_lines(luma, method),
            DetectionMethod::ContrastBoosted => {
                let boosted = contrast_boost(image, luma);
                self.detect_lines(&boosted, method)
            }
            DetectionMethod::Fft => self.fft.detect(luma),
        }
    }

    fn detect_lines(&self, img: &ImageF32, method: DetectionMethod) -> GridDetection {
        if self.tiling.multitile {
            detect_tiled(&self.detector, img, &self.tiling, self.merge_distance, method)
        } else {
            self.detector.detect(img).into_detection(method)
        }
    }

    pub fn score(&self, detection: &GridDetection) -> f64 {
        let o = &self.options;
        let count = (detection.line_count() as f64 / o.target_line_count.max(1) as f64).min(1.0);
        let validation = if detection.validation_passed { 1.0 } else { 0.0 };
        (o.count_weight * count + o.validation_weight * validation).clamp(0.0, 1.0)
    }

    pub fn grade(&self, best_score: f64) -> ProcessingStatus {
        if best_score >= self.options.good {
            ProcessingStatus::Ok
        } else if best_score >= self.options.poor {
            ProcessingStatus::Warning
        } else {
            ProcessingStatus::ManualReview
        }
    }
}

/// Grid-emphasis plane for the contrast-boosted tier.
///
/// Color input subtracts redness from luminance so a red grid darkens while
/// white paper and the black trace are unchanged; gray input is used as is.
/// Both are then stretched between their 1st and 99th percentiles.
pub fn contrast_boost(image: &RasterImage, luma: &ImageF32) -> ImageF32 {
    let emphasis = match image.color() {
        Some(rgb) => {
            let red = rgb.redness();
            let mut out = luma.clone();
            for (v, r) in out.data.iter_mut().zip(&red.data) {
                *v = (*v - r).clamp(0.0, 1.0);
            }
            out
        }
        None => luma.clone(),
    };
    stretch_percentiles(&emphasis, 0.01, 0.99)
}

/// Linear stretch mapping the `lo` and `hi` percentiles to 0 and 1.
pub fn stretch_percentiles(img: &ImageF32, lo: f32, hi: f32) -> ImageF32 {
    let p_lo = percentile(&img.data, lo);
    let p_hi = percentile(&img.data, hi);
    if !(p_hi - p_lo > 1e-6) {
        return img.clone();
    }
    let range = p_hi - p_lo;
    img.map(|v| ((v - p_lo) / range).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{FitOptions, GridLine, OscillationOptions};
    use crate::grid::{FftOptions, MultiScaleOptions};
    use crate::image::ImageRgbF32;
    use crate::lines::LineFinderOptions;

    fn processor() -> AdaptiveProcessor {
        AdaptiveProcessor::new(
            AdaptiveOptions::default(),
            MultiScaleGridDetector::new(
                MultiScaleOptions::default(),
                LineFinderOptions::default(),
                FitOptions::default(),
                OscillationOptions::default(),
            ),
            FftGridReconstructor::new(FftOptions::default()),
        )
    }

    fn detection(lines: usize, passed: bool) -> GridDetection {
        let mut d = GridDetection::empty(DetectionMethod::Standard);
        d.horizontal = (0..lines)
            .map(|i| GridLine::constant(crate::angle::Orientation::Horizontal, i as f64, (0.0, 10.0)))
            .collect();
        d.validation_passed = passed;
        d
    }

    #[test]
    fn score_weights_count_and_validation() {
        let p = processor();
        assert!((p.score(&detection(40, true)) - 1.0).abs() < 1e-12);
        assert!((p.score(&detection(80, false)) - 0.7).abs() < 1e-12);
        assert!((p.score(&detection(20, true)) - 0.65).abs() < 1e-12);
        assert_eq!(p.score(&detection(0, false)), 0.0);
    }

    #[test]
    fn grades_follow_thresholds() {
        let p = processor();
        assert_eq!(p.grade(0.95), ProcessingStatus::Ok);
        assert_eq!(p.grade(0.7), ProcessingStatus::Ok);
        assert_eq!(p.grade(0.5), ProcessingStatus::Warning);
        assert_eq!(p.grade(0.1), ProcessingStatus::ManualReview);
    }

    #[test]
    fn blank_page_tries_every_tier() {
        let img = RasterImage::Gray(ImageF32::filled(96, 96, 1.0));
        let out = processor().process(&img);
        assert_eq!(out.attempts.len(), 3);
        assert!(out.attempts.iter().all(|a| !a.success));
        assert_eq!(out.status, ProcessingStatus::ManualReview);
        // Ties keep the earliest tier.
        assert_eq!(out.method(), DetectionMethod::Standard);
    }

    #[test]
    fn stretch_maps_percentiles_to_unit_range() {
        let img = ImageF32::from_fn(100, 1, |x, _| 0.4 + 0.002 * x as f32);
        let s = stretch_percentiles(&img, 0.01, 0.99);
        assert_eq!(s.get(0, 0), 0.0);
        assert_eq!(s.get(99, 0), 1.0);
        assert!((s.get(50, 0) - 0.5).abs() < 0.02);
        let flat = ImageF32::filled(8, 8, 0.7);
        assert_eq!(stretch_percentiles(&flat, 0.01, 0.99), flat);
    }

    #[test]
    fn boost_darkens_red_grid_only() {
        let mut rgb = ImageRgbF32::new(100, 1);
        for x in 0..100 {
            let px = match x % 10 {
                0 => [1.0, 0.5, 0.5],
                5 => [0.0, 0.0, 0.0],
                _ => [1.0, 1.0, 1.0],
            };
            rgb.set(x, 0, px);
        }
        let raster = RasterImage::Rgb(rgb);
        let boosted = contrast_boost(&raster, &raster.luma());
        assert!(boosted.get(0, 0) < 0.3, "grid {}", boosted.get(0, 0));
        assert!(boosted.get(5, 0) < 0.05);
        assert!((boosted.get(1, 0) - 1.0).abs() < 1e-6);
    }
}
