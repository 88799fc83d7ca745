//! Grid detection, intersection and calibration.
//!
//! - `multiscale`: fine/bold two-pass detection on line masks.
//! - `fft`: frequency-domain fallback that recovers line positions only.
//! - `tiling`: split/merge of large scans, tiles processed in parallel.
//! - `intersections`: crossings of fitted horizontal and vertical lines.
//! - `calibration`: spacing → pixels per mm / mV / second.
pub mod calibration;
pub mod fft;
pub mod intersections;
pub mod multiscale;
pub mod tiling;

pub use calibration::{
    Calibration, CalibrationOptions, CalibrationSource, SpacingCalibrator, SpacingRule,
};
pub use fft::{FftGridReconstructor, FftOptions, FftReconstruction};
pub use intersections::{dedupe_intersections, Intersection, IntersectionOptions, IntersectionSolver};
pub use multiscale::{LineExtractor, MultiScaleGridDetector, MultiScaleOptions, MultiScaleResult};
pub use tiling::{detect_tiled, split_tiles, Tile, TilingOptions};

use crate::fit::GridLine;
use serde::{Deserialize, Serialize};

/// Detection strategy that produced a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Standard,
    ContrastBoosted,
    Fft,
}

impl DetectionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMethod::Standard => "standard",
            DetectionMethod::ContrastBoosted => "contrast_boosted",
            DetectionMethod::Fft => "fft",
        }
    }
}

/// Fitted grid of one detection attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDetection {
    pub method: DetectionMethod,
    pub horizontal: Vec<GridLine>,
    pub vertical: Vec<GridLine>,
    /// Raw spacing (pixels) between vertical lines.
    pub spacing_x: Option<f64>,
    /// Raw spacing (pixels) between horizontal lines.
    pub spacing_y: Option<f64>,
    /// Fine/bold ratio check, or reconstruction validity for FFT grids.
    pub validation_passed: bool,
    pub bold_lines: usize,
    pub demoted_lines: usize,
}

impl GridDetection {
    pub fn empty(method: DetectionMethod) -> Self {
        Self {
            method,
            horizontal: Vec::new(),
            vertical: Vec::new(),
            spacing_x: None,
            spacing_y: None,
            validation_passed: false,
            bold_lines: 0,
            demoted_lines: 0,
        }
    }

    pub fn line_count(&self) -> usize {
        self.horizontal.len() + self.vertical.len()
    }

    /// Mean R² over all lines, 0 without lines.
    pub fn mean_r2(&self) -> f64 {
        let n = self.line_count();
        if n == 0 {
            return 0.0;
        }
        self.horizontal
            .iter()
            .chain(&self.vertical)
            .map(|l| l.r2)
            .sum::<f64>()
            / n as f64
    }
}
