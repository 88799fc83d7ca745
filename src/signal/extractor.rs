//! Column-wise trace extraction for one lead region.
//!
//! Every column is one time sample. The column is inverted when its mean
//! says the background is light, so the trace becomes the bright part. An
//! adaptive threshold (75th percentile for textured columns, mean + 1σ for
//! flat ones, clamped to 30–80% of the column maximum) selects the trace
//! pixels and their intensity-weighted centroid is the trace row. Columns
//! without any pixel above threshold repeat the previous voltage, or sit at
//! the region centre before the first detection.
//!
//! With multi-tile processing enabled the region is split into overlapping
//! column spans whose centroids are computed in parallel. Overlapping
//! columns take the value of the leftmost span. The hold-previous gap fill
//! runs afterwards over the whole region.
use crate::grid::{split_tiles, Calibration, TilingOptions};
use crate::image::f32::{mean_std, percentile};
use crate::image::{ImageF32, ImageView};
use crate::types::{LeadRegion, LeadSignal, LeadStatus};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionOptions {
    /// Output sampling rate (Hz).
    pub sampling_rate: u32,
    /// Threshold percentile for columns with real intensity variation.
    pub percentile: f32,
    /// Column standard deviation below which mean + 1σ is used instead.
    pub min_column_std: f32,
    /// Threshold clamp, as fractions of the column maximum.
    pub clamp_low: f32,
    pub clamp_high: f32,
    /// Duration (seconds) of the zero-filled signal of an unusable region.
    pub expected_duration_s: f32,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            sampling_rate: 500,
            percentile: 0.75,
            min_column_std: 0.02,
            clamp_low: 0.3,
            clamp_high: 0.8,
            expected_duration_s: 2.5,
        }
    }
}

pub struct SignalExtractor {
    options: ExtractionOptions,
    tiling: TilingOptions,
}

impl SignalExtractor {
    pub fn new(options: ExtractionOptions) -> Self {
        Self {
            options,
            tiling: TilingOptions::default(),
        }
    }

    /// Split regions into column spans when `tiling.multitile` is set; only
    /// `tiles_x` and `overlap` apply.
    pub fn with_tiling(mut self, tiling: TilingOptions) -> Self {
        self.tiling = tiling;
        self
    }

    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    /// Extract one lead from the full image.
    pub fn extract(&self, img: &ImageF32, region: &LeadRegion, calibration: &Calibration) -> LeadSignal {
        let usable_calibration = calibration.pixels_per_mv > 0.0
            && calibration.pixels_per_second > 0.0
            && calibration.pixels_per_mv.is_finite()
            && calibration.pixels_per_second.is_finite();
        if !region.fits(img.w, img.h) || !usable_calibration {
            warn!(
                "lead {}: region {}x{}+{}+{} unusable, zero-filling",
                region.name, region.width, region.height, region.x, region.y
            );
            return self.zero_filled(&region.name);
        }
        let roi = img.crop(region.x, region.y, region.width, region.height);
        let millivolts = self.column_voltages(&roi, calibration.pixels_per_mv as f32);
        let duration = (roi.w as f64 / calibration.pixels_per_second) as f32;
        let values = resample(
            &millivolts,
            calibration.pixels_per_second as f32,
            self.options.sampling_rate,
            duration,
        );
        debug!(
            "lead {}: {} columns -> {} samples ({:.3}s)",
            region.name,
            roi.w,
            values.len(),
            duration
        );
        LeadSignal {
            name: region.name.clone(),
            values,
            sampling_rate: self.options.sampling_rate,
            duration,
            status: LeadStatus::Extracted,
        }
    }

    pub fn zero_filled(&self, name: &str) -> LeadSignal {
        LeadSignal::zero_filled(
            name,
            self.options.sampling_rate,
            self.options.expected_duration_s,
        )
    }

    /// Per-column voltage (mV) of the trace in `roi`.
    pub fn column_voltages(&self, roi: &ImageF32, pixels_per_mv: f32) -> Vec<f32> {
        let center = (roi.h as f32 - 1.0) * 0.5;
        let mut out = Vec::with_capacity(roi.w);
        let mut previous: Option<f32> = None;
        for found in self.trace_rows(roi) {
            let row = found.unwrap_or_else(|| match previous {
                Some(mv) => center - mv * pixels_per_mv,
                None => center,
            });
            let mv = (center - row) / pixels_per_mv;
            previous = Some(mv);
            out.push(mv);
        }
        out
    }

    /// Trace row of every column, `None` where nothing clears threshold.
    pub fn trace_rows(&self, roi: &ImageF32) -> Vec<Option<f32>> {
        let rows_of = |x0: usize, w: usize| -> Vec<Option<f32>> {
            (x0..x0 + w).map(|x| self.trace_row(&roi.column(x))).collect()
        };
        if !self.tiling.multitile || self.tiling.tiles_x < 2 {
            return rows_of(0, roi.w);
        }
        let spans = TilingOptions {
            tiles_y: 1,
            ..self.tiling.clone()
        };
        let tiles = split_tiles(roi.w, roi.h, &spans);
        let per_span: Vec<(usize, Vec<Option<f32>>)> = tiles
            .par_iter()
            .map(|t| (t.x0, rows_of(t.x0, t.w)))
            .collect();
        let mut out = vec![None; roi.w];
        let mut done = vec![false; roi.w];
        for (x0, rows) in per_span {
            for (x, row) in (x0..).zip(rows) {
                if !done[x] {
                    out[x] = row;
                    done[x] = true;
                }
            }
        }
        debug!("extract: {} columns in {} spans", roi.w, tiles.len());
        out
    }

    /// Weighted-centroid row of the trace in one column, `None` when no
    /// pixel clears the adaptive threshold.
    pub fn trace_row(&self, column: &[f32]) -> Option<f32> {
        if column.is_empty() {
            return None;
        }
        let (mean, _) = mean_std(column);
        let values: Vec<f32> = if mean > 0.5 {
            column.iter().map(|v| 1.0 - v).collect()
        } else {
            column.to_vec()
        };
        let (mean, std) = mean_std(&values);
        let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !(max > 0.0) {
            return None;
        }
        let raw = if std > self.options.min_column_std {
            percentile(&values, self.options.percentile)
        } else {
            mean + std
        };
        let threshold = raw.clamp(self.options.clamp_low * max, self.options.clamp_high * max);

        let mut weight = 0.0f32;
        let mut moment = 0.0f32;
        for (y, &v) in values.iter().enumerate() {
            if v > threshold {
                weight += v;
                moment += v * y as f32;
            }
        }
        (weight > 0.0).then(|| moment / weight)
    }
}

/// Linear resampling of a per-column series onto `sampling_rate` Hz.
///
/// Sample `i` sits at `i / sampling_rate` seconds, i.e. column
/// `i · pixels_per_second / sampling_rate`.
pub fn resample(columns: &[f32], pixels_per_second: f32, sampling_rate: u32, duration: f32) -> Vec<f32> {
    if columns.is_empty() || sampling_rate == 0 {
        return Vec::new();
    }
    let n = ((duration * sampling_rate as f32).round() as usize).max(1);
    let step = pixels_per_second / sampling_rate as f32;
    let last = (columns.len() - 1) as f32;
    (0..n)
        .map(|i| {
            let pos = (i as f32 * step).min(last);
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(columns.len() - 1);
            let t = pos - lo as f32;
            columns[lo] * (1.0 - t) + columns[hi] * t
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CalibrationOptions, CalibrationSource};

    fn calibration(px_per_mm: f64) -> Calibration {
        Calibration::from_spacing(
            px_per_mm,
            px_per_mm,
            &CalibrationOptions::default(),
            CalibrationSource::Intersections,
        )
    }

    #[test]
    fn centroid_of_dark_band() {
        let ex = SignalExtractor::new(ExtractionOptions::default());
        let mut col = vec![1.0f32; 50];
        col[20] = 0.0;
        col[21] = 0.0;
        let row = ex.trace_row(&col).expect("trace");
        assert!((row - 20.5).abs() < 1e-4);
        assert!(ex.trace_row(&vec![1.0f32; 50]).is_none());
    }

    #[test]
    fn column_spans_match_whole_region() {
        let roi = ImageF32::from_fn(203, 60, |x, y| {
            let row = 30.0 + 12.0 * (x as f32 * 0.07).sin();
            // Blank stretch straddling the span border.
            if (95..110).contains(&x) || (y as f32 - row).abs() > 1.0 {
                1.0
            } else {
                0.0
            }
        });
        let whole = SignalExtractor::new(ExtractionOptions::default());
        let tiled = SignalExtractor::new(ExtractionOptions::default()).with_tiling(TilingOptions {
            multitile: true,
            tiles_x: 3,
            tiles_y: 4,
            overlap: 0.2,
        });
        assert_eq!(tiled.trace_rows(&roi).len(), 203);
        assert_eq!(tiled.trace_rows(&roi), whole.trace_rows(&roi));
        assert_eq!(
            tiled.column_voltages(&roi, 10.0),
            whole.column_voltages(&roi, 10.0)
        );
        assert_eq!(tiled.trace_rows(&roi)[100], None);
    }

    #[test]
    fn gaps_hold_previous_voltage() {
        let ex = SignalExtractor::new(ExtractionOptions::default());
        let roi = ImageF32::from_fn(6, 41, |x, y| if x < 3 && y == 10 { 0.0 } else { 1.0 });
        let mv = ex.column_voltages(&roi, 10.0);
        assert!((mv[0] - 1.0).abs() < 1e-5);
        assert_eq!(mv[3], mv[2]);
        assert_eq!(mv[5], mv[0]);
    }

    #[test]
    fn blank_region_starts_at_zero() {
        let ex = SignalExtractor::new(ExtractionOptions::default());
        let roi = ImageF32::filled(4, 21, 1.0);
        assert_eq!(ex.column_voltages(&roi, 10.0), vec![0.0; 4]);
    }

    #[test]
    fn resample_length_follows_duration() {
        let cols: Vec<f32> = (0..250).map(|i| i as f32).collect();
        // 250 px at 250 px/s is one second.
        let out = resample(&cols, 250.0, 500, 1.0);
        assert_eq!(out.len(), 500);
        assert!((out[2] - 1.0).abs() < 1e-5);
        assert!((out[1] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn out_of_bounds_region_is_zero_filled() {
        let ex = SignalExtractor::new(ExtractionOptions::default());
        let img = ImageF32::filled(100, 100, 1.0);
        let lead = ex.extract(&img, &LeadRegion::new("V6", 50, 50, 80, 20), &calibration(10.0));
        assert_eq!(lead.status, LeadStatus::ZeroFilled);
        assert_eq!(lead.values.len(), 1250);
        assert_eq!(lead.duration, 2.5);
    }
}
