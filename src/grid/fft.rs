//! Frequency-domain grid recovery for scans where lines are broken or faint.
//!
//! The inverted, mean-removed image is transformed with a 2D FFT and the
//! magnitude spectrum is projected onto each frequency axis. The strongest
//! periodicities per axis are resynthesised as a 1D cosine profile (phase
//! taken from the axis row/column of the spectrum); profile maxima above
//! `mask_threshold` become grid line positions. Only positions are
//! recovered: every reconstructed line is straight and spans the image.
use super::calibration::SpacingRule;
use super::{DetectionMethod, GridDetection};
use crate::angle::Orientation;
use crate::edges::edge_density;
use crate::fit::GridLine;
use crate::image::{BinaryMask, ImageF32};
use log::debug;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FftOptions {
    /// Frequencies kept per axis.
    pub top_peaks: usize,
    /// Axes with fewer significant peaks contribute no lines.
    pub min_peaks: usize,
    /// Shortest period (pixels) considered.
    pub min_period_px: f32,
    /// Peak significance in standard deviations above the projection mean.
    pub peak_sigma: f32,
    /// Normalised profile level that marks a line.
    pub mask_threshold: f32,
    pub min_edge_density: f32,
    pub min_variance: f32,
}

impl Default for FftOptions {
    fn default() -> Self {
        Self {
            top_peaks: 3,
            min_peaks: 1,
            min_period_px: 3.0,
            peak_sigma: 2.0,
            mask_threshold: 0.6,
            min_edge_density: 0.01,
            min_variance: 0.005,
        }
    }
}

/// One periodic component along an axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyPeak {
    /// Cycles per image extent.
    pub index: usize,
    pub period_px: f32,
    pub magnitude: f32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FftReconstruction {
    /// Peaks along x (periodicity of vertical lines).
    pub peaks_x: Vec<FrequencyPeak>,
    /// Peaks along y (periodicity of horizontal lines).
    pub peaks_y: Vec<FrequencyPeak>,
    /// Column positions of vertical lines.
    pub positions_x: Vec<f32>,
    /// Row positions of horizontal lines.
    pub positions_y: Vec<f32>,
    pub edge_density: f32,
    pub variance: f32,
    pub valid: bool,
    #[serde(skip)]
    pub mask: BinaryMask,
}

impl FftReconstruction {
    pub fn into_detection(self, width: usize, height: usize, rule: SpacingRule) -> GridDetection {
        let x_domain = (0.0, width.saturating_sub(1) as f64);
        let y_domain = (0.0, height.saturating_sub(1) as f64);
        let (horizontal, vertical) = if self.valid {
            (
                self.positions_y
                    .iter()
                    .map(|&y| GridLine::constant(Orientation::Horizontal, y as f64, x_domain))
                    .collect(),
                self.positions_x
                    .iter()
                    .map(|&x| GridLine::constant(Orientation::Vertical, x as f64, y_domain))
                    .collect(),
            )
        } else {
            (Vec::new(), Vec::new())
        };
        let spacing = |p: &[f32]| {
            let coords: Vec<f64> = p.iter().map(|&v| v as f64).collect();
            rule.estimate(&coords).map(|e| e.spacing)
        };
        GridDetection {
            method: DetectionMethod::Fft,
            spacing_x: spacing(&self.positions_x),
            spacing_y: spacing(&self.positions_y),
            horizontal,
            vertical,
            validation_passed: self.valid,
            bold_lines: 0,
            demoted_lines: 0,
        }
    }
}

pub struct FftGridReconstructor {
    options: FftOptions,
    spacing: SpacingRule,
}

impl FftGridReconstructor {
    pub fn new(options: FftOptions) -> Self {
        Self {
            options,
            spacing: SpacingRule::default(),
        }
    }

    /// Rule used for the spacing of reconstructed positions.
    pub fn with_spacing_rule(mut self, rule: SpacingRule) -> Self {
        self.spacing = rule;
        self
    }

    pub fn reconstruct(&self, img: &ImageF32) -> FftReconstruction {
        let (w, h) = (img.w, img.h);
        if w < 4 || h < 4 {
            return FftReconstruction {
                peaks_x: Vec::new(),
                peaks_y: Vec::new(),
                positions_x: Vec::new(),
                positions_y: Vec::new(),
                edge_density: 0.0,
                variance: 0.0,
                valid: false,
                mask: BinaryMask::new(w, h),
            };
        }
        let spectrum = spectrum_2d(img);

        // Column kx of the projection collects periodicity along x.
        let mut proj_x = vec![0.0f32; w];
        let mut proj_y = vec![0.0f32; h];
        for ky in 0..h {
            for kx in 0..w {
                let m = spectrum[ky * w + kx].norm();
                proj_x[kx] += m;
                proj_y[ky] += m;
            }
        }
        let peaks_x = self.find_peaks(&proj_x);
        let peaks_y = self.find_peaks(&proj_y);

        let axis_x: Vec<Complex<f32>> = (0..w).map(|kx| spectrum[kx]).collect();
        let axis_y: Vec<Complex<f32>> = (0..h).map(|ky| spectrum[ky * w]).collect();
        let positions_x = self.positions(&peaks_x, &axis_x);
        let positions_y = self.positions(&peaks_y, &axis_y);

        let mut mask = BinaryMask::new(w, h);
        let mut col_on = vec![false; w];
        let mut row_on = vec![false; h];
        for &x in &positions_x {
            col_on[(x.round() as usize).min(w - 1)] = true;
        }
        for &y in &positions_y {
            row_on[(y.round() as usize).min(h - 1)] = true;
        }
        for y in 0..h {
            for x in 0..w {
                if row_on[y] || col_on[x] {
                    mask.set(x, y, true);
                }
            }
        }

        let as_image = ImageF32::from_fn(w, h, |x, y| if mask.get(x, y) { 1.0 } else { 0.0 });
        let density = edge_density(&as_image, 0.5);
        let (_, std) = as_image.mean_std();
        let variance = std * std;
        let valid = !(positions_x.is_empty() && positions_y.is_empty())
            && density >= self.options.min_edge_density
            && variance >= self.options.min_variance;
        debug!(
            "fft: peaks x={} y={} lines x={} y={} edge_density={:.4} variance={:.4} valid={}",
            peaks_x.len(),
            peaks_y.len(),
            positions_x.len(),
            positions_y.len(),
            density,
            variance,
            valid
        );
        FftReconstruction {
            peaks_x,
            peaks_y,
            positions_x,
            positions_y,
            edge_density: density,
            variance,
            valid,
            mask,
        }
    }

    pub fn detect(&self, img: &ImageF32) -> GridDetection {
        self.reconstruct(img).into_detection(img.w, img.h, self.spacing)
    }

    /// Significant local maxima of an axis projection, strongest first.
    pub fn find_peaks(&self, projection: &[f32]) -> Vec<FrequencyPeak> {
        let n = projection.len();
        let k_max = ((n as f32 / self.options.min_period_px.max(2.0)).floor() as usize).min(n / 2);
        if k_max < 3 {
            return Vec::new();
        }
        let band = &projection[2..=k_max];
        let mean = band.iter().sum::<f32>() / band.len() as f32;
        let var = band.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / band.len() as f32;
        let cut = mean + self.options.peak_sigma * var.sqrt();

        let mut peaks: Vec<FrequencyPeak> = (2..=k_max)
            .filter(|&k| {
                let v = projection[k];
                v > cut && v >= projection[k - 1] && v >= projection[(k + 1).min(n - 1)]
            })
            .map(|k| FrequencyPeak {
                index: k,
                period_px: n as f32 / k as f32,
                magnitude: projection[k],
            })
            .collect();
        peaks.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude).then(a.index.cmp(&b.index)));
        peaks.truncate(self.options.top_peaks);
        if peaks.len() < self.options.min_peaks.max(1) {
            return Vec::new();
        }
        peaks
    }

    /// Line positions from the resynthesised profile of one axis.
    fn positions(&self, peaks: &[FrequencyPeak], axis: &[Complex<f32>]) -> Vec<f32> {
        let n = axis.len();
        if peaks.is_empty() || n == 0 {
            return Vec::new();
        }
        let profile: Vec<f32> = (0..n)
            .map(|x| {
                peaks
                    .iter()
                    .map(|p| {
                        let c = axis[p.index];
                        let phase = 2.0 * PI * p.index as f32 * x as f32 / n as f32;
                        c.norm() * (phase + c.arg()).cos()
                    })
                    .sum()
            })
            .collect();
        let (lo, hi) = profile
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if !(hi - lo > 1e-9) {
            return Vec::new();
        }
        let norm: Vec<f32> = profile.iter().map(|v| (v - lo) / (hi - lo)).collect();
        (0..n)
            .filter(|&i| {
                let v = norm[i];
                let left = if i > 0 { norm[i - 1] } else { f32::NEG_INFINITY };
                let right = if i + 1 < n { norm[i + 1] } else { f32::NEG_INFINITY };
                v >= self.options.mask_threshold && v > left && v >= right
            })
            .map(|i| i as f32)
            .collect()
    }
}

/// Row-then-column FFT of the inverted, mean-removed image (row-major).
fn spectrum_2d(img: &ImageF32) -> Vec<Complex<f32>> {
    let (w, h) = (img.w, img.h);
    let (mean, _) = img.mean_std();
    let mut buf: Vec<Complex<f32>> = img
        .data
        .iter()
        .map(|&v| Complex::new((1.0 - v) - (1.0 - mean), 0.0))
        .collect();
    let mut planner = FftPlanner::<f32>::new();
    let row_fft = planner.plan_fft_forward(w);
    for row in buf.chunks_exact_mut(w) {
        row_fft.process(row);
    }
    let col_fft = planner.plan_fft_forward(h);
    let mut column = vec![Complex::new(0.0, 0.0); h];
    for x in 0..w {
        for y in 0..h {
            column[y] = buf[y * w + x];
        }
        col_fft.process(&mut column);
        for y in 0..h {
            buf[y * w + x] = column[y];
        }
    }
    buf
}
