//! Diagnostics attached to every digitization result.
//!
//! `GridSummary` condenses the chosen detection, `InputDescriptor` records
//! the raster that was processed and `TimingBreakdown` lists stage timings.
//! The full attempt list of the adaptive stage travels alongside these in
//! the result metadata.
pub mod timing;

pub use timing::{elapsed_ms, StageTiming, TimingBreakdown};

use crate::grid::{DetectionMethod, GridDetection};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub width: usize,
    pub height: usize,
    pub color: bool,
}

/// Counts and fit statistics of the selected grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSummary {
    pub method: DetectionMethod,
    pub horizontal_lines: usize,
    pub vertical_lines: usize,
    pub bold_lines: usize,
    pub demoted_lines: usize,
    pub intersections: usize,
    pub mean_r2: f64,
    /// Highest polynomial order among the fitted lines.
    pub max_order: usize,
    pub validation_passed: bool,
}

impl GridSummary {
    pub fn new(detection: &GridDetection, intersections: usize) -> Self {
        let max_order = detection
            .horizontal
            .iter()
            .chain(&detection.vertical)
            .map(|l| l.order)
            .max()
            .unwrap_or(0);
        Self {
            method: detection.method,
            horizontal_lines: detection.horizontal.len(),
            vertical_lines: detection.vertical.len(),
            bold_lines: detection.bold_lines,
            demoted_lines: detection.demoted_lines,
            intersections,
            mean_r2: detection.mean_r2(),
            max_order,
            validation_passed: detection.validation_passed,
        }
    }
}
