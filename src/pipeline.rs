//! End-to-end digitization of one preprocessed ECG scan.
//!
//! Stages, in order:
//! 1. quality gates on the luminance plane (a failure rejects the scan),
//! 2. adaptive grid detection over the three tiers,
//! 3. intersections of the selected grid's lines,
//! 4. spacing calibration with line-spacing and default fallbacks,
//! 5. per-lead extraction and filtering (leads run in parallel),
//! 6. quality scoring of the finished signals.
//!
//! Every stage returns a new value; the [`Digitizer`] holds configuration
//! only, so repeated runs on the same input give identical output.
//!
//! ```no_run
//! use ecg_digitizer::prelude::*;
//!
//! # fn main() -> ecg_digitizer::Result<()> {
//! let digitizer = Digitizer::new(DigitizerConfig::default());
//! let image = ecg_digitizer::image::io::load_raster(std::path::Path::new("scan.png"))?;
//! let regions = vec![LeadRegion::new("II", 0, 400, 1200, 200)];
//! match digitizer.process(&image, &regions)? {
//!     Digitization::Rejected(report) => println!("rejected: {:?}", report.recommendation),
//!     Digitization::Completed(result) => println!("score {:.3}", result.metadata.quality.overall),
//! }
//! # Ok(())
//! # }
//! ```
use crate::adaptive::{AdaptiveProcessor, AttemptRecord};
use crate::config::DigitizerConfig;
use crate::diagnostics::{elapsed_ms, GridSummary, InputDescriptor, TimingBreakdown};
use crate::error::{DigitizeError, Result};
use crate::grid::{
    dedupe_intersections, Calibration, CalibrationSource, DetectionMethod, FftGridReconstructor,
    GridDetection, Intersection, IntersectionSolver, MultiScaleGridDetector, SpacingCalibrator,
};
use crate::image::io::load_raster;
use crate::image::RasterImage;
use crate::quality::{GateReport, QualityAssessor, QualityGates, QualityReport};
use crate::signal::{SignalExtractor, SignalPostProcessor};
use crate::types::{LeadRegion, LeadSignal, ProcessingStatus};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

/// Outcome of one scan.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Digitization {
    /// The scan failed the quality gates; no detection was attempted.
    Rejected(GateReport),
    Completed(Box<DigitizationResult>),
}

impl Digitization {
    pub fn completed(&self) -> Option<&DigitizationResult> {
        match self {
            Digitization::Completed(r) => Some(r),
            Digitization::Rejected(_) => None,
        }
    }

    pub fn status_line(&self) -> String {
        match self {
            Digitization::Rejected(report) => format!(
                "rejected: {}",
                report.recommendation.as_deref().unwrap_or("quality gates failed")
            ),
            Digitization::Completed(r) => format!(
                "{:?}: method={} leads={} quality={:.3}",
                r.metadata.status,
                r.metadata.method.as_str(),
                r.leads.len(),
                r.metadata.quality.overall
            ),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DigitizationResult {
    pub leads: Vec<LeadSignal>,
    pub metadata: Metadata,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub calibration: Calibration,
    pub quality: QualityReport,
    pub status: ProcessingStatus,
    pub method: DetectionMethod,
    pub grid_score: f64,
    pub grid: GridSummary,
    pub input: InputDescriptor,
    /// `None` when the gates are disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gates: Option<GateReport>,
    pub attempts: Vec<AttemptRecord>,
    #[serde(skip)]
    pub intersections: Vec<Intersection>,
    pub timings: TimingBreakdown,
}

pub struct Digitizer {
    config: DigitizerConfig,
    gates: QualityGates,
    adaptive: AdaptiveProcessor,
    solver: IntersectionSolver,
    calibrator: SpacingCalibrator,
    extractor: SignalExtractor,
    postprocessor: SignalPostProcessor,
    assessor: QualityAssessor,
}

impl Digitizer {
    pub fn new(config: DigitizerConfig) -> Self {
        let c = &config;
        let detector = MultiScaleGridDetector::new(
            c.multiscale.clone(),
            c.finder.clone(),
            c.fit.clone(),
            c.oscillation.clone(),
        )
        .with_spacing_rule(c.calibration.spacing_rule());
        let adaptive = AdaptiveProcessor::new(
            c.adaptive.clone(),
            detector,
            FftGridReconstructor::new(c.fft.clone()).with_spacing_rule(c.calibration.spacing_rule()),
        )
        .with_tiling(c.tiling.clone(), c.finder.cluster_threshold as f64);
        Self {
            gates: QualityGates::new(c.gates.clone()),
            adaptive,
            solver: IntersectionSolver::new(c.intersections.clone()),
            calibrator: SpacingCalibrator::new(c.calibration.clone()),
            extractor: SignalExtractor::new(c.extraction.clone()).with_tiling(c.tiling.clone()),
            postprocessor: SignalPostProcessor::new(c.filters.clone()),
            assessor: QualityAssessor::new(c.quality.clone()),
            config,
        }
    }

    pub fn config(&self) -> &DigitizerConfig {
        &self.config
    }

    /// Load `path` and digitize it.
    pub fn process_path(&self, path: &Path, regions: &[LeadRegion]) -> Result<Digitization> {
        let image = load_raster(path)?;
        self.process(&image, regions)
    }

    /// Digitize `image`; `regions` are the lead rectangles in image pixels.
    ///
    /// Only an empty raster, or one whose buffer does not match its
    /// dimensions, is an error. Rejected scans, weak grids and
    /// unusable regions are reported in the returned value.
    pub fn process(&self, image: &RasterImage, regions: &[LeadRegion]) -> Result<Digitization> {
        if !image.is_well_formed() {
            return Err(DigitizeError::EmptyImage {
                width: image.width(),
                height: image.height(),
            });
        }
        let total = Instant::now();
        let mut timings = TimingBreakdown::default();
        let input = InputDescriptor {
            width: image.width(),
            height: image.height(),
            color: image.color().is_some(),
        };
        debug!(
            "digitize: {}x{} color={} regions={}",
            input.width,
            input.height,
            input.color,
            regions.len()
        );
        let luma = timings.measure("luma", || image.luma());

        let gates = if self.config.gates.enabled {
            let report = timings.measure("gates", || self.gates.check(&luma));
            if !report.passed {
                warn!(
                    "digitize: rejected by quality gates ({})",
                    report.recommendation.as_deref().unwrap_or("-")
                );
                return Ok(Digitization::Rejected(report));
            }
            Some(report)
        } else {
            None
        };

        let outcome = timings.measure("adaptive", || self.adaptive.process_with_luma(image, &luma));
        let detection = &outcome.detection;

        let intersections = timings.measure("intersections", || {
            let points = self.solver.solve(&detection.horizontal, &detection.vertical);
            dedupe_intersections(points, self.config.intersections.tolerance_px)
        });

        let calibration = timings.measure("calibration", || {
            self.calibrator
                .calibrate(&intersections, detection.spacing_x, detection.spacing_y)
        });

        let leads = timings.measure("signals", || self.extract_leads(&luma, regions, &calibration));

        let quality = timings.measure("quality", || {
            self.assessor
                .assess(&leads, detection, intersections.len(), &calibration)
        });

        let status = self.final_status(outcome.status, &calibration);
        timings.total_ms = elapsed_ms(total);
        info!(
            "digitize: {:?} via {} (grid score {:.3}, quality {:.3}, {:.1} ms)",
            status,
            outcome.method().as_str(),
            outcome.score,
            quality.overall,
            timings.total_ms
        );

        let grid = GridSummary::new(detection, intersections.len());
        let metadata = Metadata {
            calibration,
            quality,
            status,
            method: outcome.method(),
            grid_score: outcome.score,
            grid,
            input,
            gates,
            attempts: outcome.attempts,
            intersections,
            timings,
        };
        Ok(Digitization::Completed(Box::new(DigitizationResult {
            leads,
            metadata,
        })))
    }

    /// Extract and filter every region; output order follows `regions`.
    pub fn extract_leads(
        &self,
        luma: &crate::image::ImageF32,
        regions: &[LeadRegion],
        calibration: &Calibration,
    ) -> Vec<LeadSignal> {
        regions
            .par_iter()
            .map(|region| {
                let raw = self.extractor.extract(luma, region, calibration);
                self.postprocessor.process_lead(&raw)
            })
            .collect()
    }

    /// Grid detection only, without gates or signal extraction.
    pub fn detect_grid(&self, image: &RasterImage) -> GridDetection {
        self.adaptive.process(image).detection
    }

    fn final_status(&self, adaptive: ProcessingStatus, calibration: &Calibration) -> ProcessingStatus {
        match (adaptive, calibration.source) {
            (ProcessingStatus::Ok, CalibrationSource::Default) => ProcessingStatus::Warning,
            (status, _) => status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageF32;
    use crate::quality::GateKind;

    #[test]
    fn blank_scan_is_rejected_for_contrast() {
        let digitizer = Digitizer::new(DigitizerConfig::default());
        let img = RasterImage::Gray(ImageF32::filled(1200, 800, 1.0));
        let out = digitizer
            .process(&img, &[LeadRegion::new("II", 0, 0, 100, 50)])
            .expect("process");
        let Digitization::Rejected(report) = out else {
            panic!("blank scan must be rejected");
        };
        let contrast = report.check(GateKind::Contrast).expect("contrast check");
        assert!(!contrast.passed);
        assert!(report
            .recommendation
            .as_deref()
            .is_some_and(|r| r.contains("contrast")));
    }

    #[test]
    fn empty_raster_is_an_error() {
        let digitizer = Digitizer::new(DigitizerConfig::default());
        let img = RasterImage::Gray(ImageF32::new(0, 0));
        assert!(matches!(
            digitizer.process(&img, &[]),
            Err(DigitizeError::EmptyImage { .. })
        ));
    }

    #[test]
    fn short_buffer_is_an_error() {
        let digitizer = Digitizer::new(DigitizerConfig::default());
        let img = RasterImage::Gray(ImageF32 {
            w: 10,
            h: 10,
            stride: 10,
            data: vec![0.5; 5],
        });
        assert!(matches!(
            digitizer.process(&img, &[]),
            Err(DigitizeError::EmptyImage {
                width: 10,
                height: 10
            })
        ));
    }

    #[test]
    fn default_calibration_downgrades_ok() {
        let digitizer = Digitizer::new(DigitizerConfig::default());
        let cal = Calibration::default();
        assert_eq!(
            digitizer.final_status(ProcessingStatus::Ok, &cal),
            ProcessingStatus::Warning
        );
        assert_eq!(
            digitizer.final_status(ProcessingStatus::ManualReview, &cal),
            ProcessingStatus::ManualReview
        );
    }
}
