//! Pixel-to-physical scale from grid spacing.
//!
//! Spacing along each axis is the median of consecutive differences between
//! distinct sorted coordinates, after discarding differences that stray
//! from a first median by more than `outlier_fraction`. The resulting
//! spacing is taken as one 1 mm grid unit.
use super::intersections::Intersection;
use crate::fit::GridLine;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    /// Spacing (pixels per mm) used when nothing better is available.
    pub default_spacing_px: f64,
    /// Relative deviation from the median beyond which a spacing is an outlier.
    pub outlier_fraction: f64,
    /// Coordinates closer than this (pixels) belong to the same grid line.
    pub merge_px: f64,
    /// Voltage per mm of paper (standard gain 10 mm/mV).
    pub mv_per_mm: f64,
    /// Time per mm of paper (standard speed 25 mm/s).
    pub s_per_mm: f64,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            default_spacing_px: 10.0,
            outlier_fraction: 0.5,
            merge_px: 1.0,
            mv_per_mm: 0.1,
            s_per_mm: 0.04,
        }
    }
}

impl CalibrationOptions {
    pub fn spacing_rule(&self) -> SpacingRule {
        SpacingRule {
            merge_px: self.merge_px,
            outlier_fraction: self.outlier_fraction,
        }
    }
}

/// Parameters of [`robust_spacing`], shared by every spacing estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpacingRule {
    pub merge_px: f64,
    pub outlier_fraction: f64,
}

impl Default for SpacingRule {
    fn default() -> Self {
        CalibrationOptions::default().spacing_rule()
    }
}

impl SpacingRule {
    pub fn estimate(&self, coords: &[f64]) -> Option<SpacingEstimate> {
        robust_spacing(coords, self.merge_px, self.outlier_fraction)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationSource {
    Intersections,
    LineSpacing,
    Default,
}

/// Robust spacing estimate along one axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacingEstimate {
    pub spacing: f64,
    /// `1 - coefficient of variation` of the kept spacings, in `[0, 1]`.
    pub consistency: f64,
    pub samples: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calibration {
    pub pixels_per_mm_x: f64,
    pub pixels_per_mm_y: f64,
    pub pixels_per_mv: f64,
    pub pixels_per_second: f64,
    pub raw_spacing_x: Option<f64>,
    pub raw_spacing_y: Option<f64>,
    pub spacing_consistency: f64,
    pub source: CalibrationSource,
}

impl Calibration {
    /// Calibration from per-axis spacings in pixels per mm.
    pub fn from_spacing(
        spacing_x: f64,
        spacing_y: f64,
        options: &CalibrationOptions,
        source: CalibrationSource,
    ) -> Self {
        Self {
            pixels_per_mm_x: spacing_x,
            pixels_per_mm_y: spacing_y,
            pixels_per_mv: spacing_y / options.mv_per_mm,
            pixels_per_second: spacing_x / options.s_per_mm,
            raw_spacing_x: None,
            raw_spacing_y: None,
            spacing_consistency: 0.0,
            source,
        }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        let options = CalibrationOptions::default();
        Self::from_spacing(
            options.default_spacing_px,
            options.default_spacing_px,
            &options,
            CalibrationSource::Default,
        )
    }
}

pub struct SpacingCalibrator {
    options: CalibrationOptions,
}

impl SpacingCalibrator {
    pub fn new(options: CalibrationOptions) -> Self {
        Self { options }
    }

    /// Calibrate from intersections, falling back per axis to the detector's
    /// raw line spacing and then to the default spacing.
    pub fn calibrate(
        &self,
        intersections: &[Intersection],
        line_spacing_x: Option<f64>,
        line_spacing_y: Option<f64>,
    ) -> Calibration {
        let xs: Vec<f64> = intersections.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = intersections.iter().map(|p| p.y).collect();
        let est_x = self.estimate(&xs);
        let est_y = self.estimate(&ys);

        let (spacing_x, source_x) = self.resolve(est_x.map(|e| e.spacing), line_spacing_x);
        let (spacing_y, source_y) = self.resolve(est_y.map(|e| e.spacing), line_spacing_y);
        let source = source_x.max(source_y);

        let consistencies: Vec<f64> = [est_x, est_y]
            .iter()
            .flatten()
            .map(|e| e.consistency)
            .collect();
        let spacing_consistency = if consistencies.is_empty() {
            0.0
        } else {
            consistencies.iter().sum::<f64>() / consistencies.len() as f64
        };

        let usable = |s: &f64| s.is_finite() && *s > 0.0;
        let mut cal = Calibration::from_spacing(spacing_x, spacing_y, &self.options, source);
        cal.raw_spacing_x = est_x.map(|e| e.spacing).or(line_spacing_x).filter(usable);
        cal.raw_spacing_y = est_y.map(|e| e.spacing).or(line_spacing_y).filter(usable);
        cal.spacing_consistency = spacing_consistency;
        match source {
            CalibrationSource::Default => warn!(
                "calibration: falling back to default spacing ({:.2} x {:.2} px/mm)",
                spacing_x, spacing_y
            ),
            _ => debug!(
                "calibration: {:.2} x {:.2} px/mm from {:?} (consistency {:.3})",
                spacing_x, spacing_y, source, spacing_consistency
            ),
        }
        cal
    }

    /// Robust spacing of one coordinate set.
    pub fn estimate(&self, coords: &[f64]) -> Option<SpacingEstimate> {
        self.options.spacing_rule().estimate(coords)
    }

    fn resolve(&self, from_points: Option<f64>, from_lines: Option<f64>) -> (f64, CalibrationSource) {
        let usable = |s: &f64| s.is_finite() && *s > 0.0;
        if let Some(s) = from_points.filter(usable) {
            (s, CalibrationSource::Intersections)
        } else if let Some(s) = from_lines.filter(usable) {
            (s, CalibrationSource::LineSpacing)
        } else {
            (self.options.default_spacing_px, CalibrationSource::Default)
        }
    }
}

/// Spacing of the distinct positions in `coords`.
///
/// Coordinates within `merge_px` of the running group are merged into their
/// mean, so every grid line contributes one position. `None` with fewer than
/// two distinct positions.
pub fn robust_spacing(coords: &[f64], merge_px: f64, outlier_fraction: f64) -> Option<SpacingEstimate> {
    let mut sorted: Vec<f64> = coords.iter().copied().filter(|c| c.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut positions: Vec<f64> = Vec::new();
    let mut group_sum = 0.0;
    let mut group_n = 0usize;
    let mut group_last = f64::NEG_INFINITY;
    for c in sorted {
        if group_n > 0 && c - group_last > merge_px {
            positions.push(group_sum / group_n as f64);
            group_sum = 0.0;
            group_n = 0;
        }
        group_sum += c;
        group_n += 1;
        group_last = c;
    }
    if group_n > 0 {
        positions.push(group_sum / group_n as f64);
    }
    if positions.len() < 2 {
        return None;
    }

    let diffs: Vec<f64> = positions
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > 0.0)
        .collect();
    let first = median(&diffs)?;
    let kept: Vec<f64> = diffs
        .into_iter()
        .filter(|d| (d - first).abs() <= outlier_fraction * first)
        .collect();
    let spacing = median(&kept)?;
    let mean = kept.iter().sum::<f64>() / kept.len() as f64;
    let var = kept.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / kept.len() as f64;
    let cv = if mean > 0.0 { var.sqrt() / mean } else { 1.0 };
    Some(SpacingEstimate {
        spacing,
        consistency: (1.0 - cv).clamp(0.0, 1.0),
        samples: kept.len(),
    })
}

/// Robust spacing between the positions of parallel lines.
pub fn line_spacing(lines: &[GridLine], rule: SpacingRule) -> Option<f64> {
    let positions: Vec<f64> = lines.iter().map(|l| l.position()).collect();
    rule.estimate(&positions).map(|e| e.spacing)
}

pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    Some(if v.len() % 2 == 0 {
        0.5 * (v[mid - 1] + v[mid])
    } else {
        v[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(xs: &[f64], ys: &[f64]) -> Vec<Intersection> {
        let mut out = Vec::new();
        for (hi, &y) in ys.iter().enumerate() {
            for (vi, &x) in xs.iter().enumerate() {
                out.push(Intersection {
                    x,
                    y,
                    horizontal: hi,
                    vertical: vi,
                });
            }
        }
        out
    }

    #[test]
    fn uniform_spacing_survives_an_outlier() {
        let mut xs: Vec<f64> = (0..=10).map(|i| 20.0 + 10.0 * i as f64).collect();
        xs.push(320.0);
        let ys: Vec<f64> = (0..6).map(|i| 15.0 + 10.0 * i as f64).collect();
        let calibrator = SpacingCalibrator::new(CalibrationOptions::default());
        let cal = calibrator.calibrate(&lattice(&xs, &ys), None, None);
        assert!((cal.pixels_per_mm_x - 10.0).abs() <= 0.5);
        assert!((cal.pixels_per_mm_y - 10.0).abs() <= 0.5);
        assert_eq!(cal.source, CalibrationSource::Intersections);
        assert!((cal.pixels_per_mv - 100.0).abs() < 5.0);
        assert!((cal.pixels_per_second - 250.0).abs() < 12.5);
        assert!(cal.spacing_consistency > 0.99);
    }

    #[test]
    fn jittered_points_merge_per_line() {
        let xs = [10.0, 10.4, 9.8, 20.1, 19.9, 30.0, 30.3];
        let est = robust_spacing(&xs, 1.0, 0.5).expect("spacing");
        assert!((est.spacing - 10.0).abs() < 0.5);
        assert_eq!(est.samples, 2);
    }

    #[test]
    fn merge_distance_comes_from_the_rule() {
        let xs = [0.0, 3.0, 10.0, 13.0, 20.0, 23.0, 30.0, 33.0];
        let fine = SpacingRule::default().estimate(&xs).expect("spacing");
        assert!((fine.spacing - 3.0).abs() < 1e-9);
        let options = CalibrationOptions {
            merge_px: 4.0,
            ..Default::default()
        };
        let merged = options.spacing_rule().estimate(&xs).expect("spacing");
        assert!((merged.spacing - 10.0).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_line_spacing_then_default() {
        let calibrator = SpacingCalibrator::new(CalibrationOptions::default());
        let cal = calibrator.calibrate(&[], Some(8.0), None);
        assert_eq!(cal.pixels_per_mm_x, 8.0);
        assert_eq!(cal.pixels_per_mm_y, 10.0);
        assert_eq!(cal.source, CalibrationSource::Default);

        let cal = calibrator.calibrate(&[], Some(8.0), Some(7.5));
        assert_eq!(cal.source, CalibrationSource::LineSpacing);
        assert!(cal.pixels_per_mv > 0.0 && cal.pixels_per_second > 0.0);
    }

    #[test]
    fn degenerate_inputs_keep_positive_values() {
        let calibrator = SpacingCalibrator::new(CalibrationOptions::default());
        let single = lattice(&[50.0], &[50.0]);
        let cal = calibrator.calibrate(&single, Some(-3.0), Some(f64::NAN));
        assert_eq!(cal.source, CalibrationSource::Default);
        assert!(cal.pixels_per_mm_x > 0.0 && cal.pixels_per_mm_y > 0.0);
        assert_eq!(cal, Calibration::default());
    }
}
