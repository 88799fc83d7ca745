//! Scoring of a finished digitization.
//!
//! - SNR per lead: power in the 0.5–40 Hz band over power in the noise band,
//!   clamped to `[0, 60]` dB.
//! - Grid: spacing consistency, line count, intersection count and mean R².
//! - Clarity: normalised contrast (std / range) and a smoothness term from
//!   the mean absolute sample-to-sample gradient.
//! - Completeness: present leads, leads with real variance and duration.
//!
//! `overall = 0.4·snr/60 + 0.2·grid + 0.2·clarity + 0.2·completeness`.
use crate::grid::{Calibration, GridDetection};
use crate::types::{LeadSignal, LeadStatus};
use log::debug;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_SNR_DB: f64 = 60.0;
const SIGNAL_BAND_HZ: (f64, f64) = (0.5, 40.0);
const MIN_LEAD_STD_MV: f64 = 1e-3;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityOptions {
    pub noise_band_hz: (f64, f64),
    pub expected_leads: usize,
    pub expected_duration_s: f64,
    pub target_intersections: usize,
    pub target_lines: usize,
}

impl Default for QualityOptions {
    fn default() -> Self {
        Self {
            noise_band_hz: (40.0, 100.0),
            expected_leads: 12,
            expected_duration_s: 2.5,
            target_intersections: 100,
            target_lines: 40,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completeness {
    pub present_ratio: f64,
    pub variance_ratio: f64,
    pub duration_ratio: f64,
    pub score: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    /// Per-lead SNR (dB).
    pub snr_db: BTreeMap<String, f64>,
    pub mean_snr_db: f64,
    pub grid_quality: f64,
    pub signal_clarity: f64,
    pub completeness: Completeness,
    pub overall: f64,
}

pub struct QualityAssessor {
    options: QualityOptions,
}

impl QualityAssessor {
    pub fn new(options: QualityOptions) -> Self {
        Self { options }
    }

    pub fn assess(
        &self,
        leads: &[LeadSignal],
        grid: &GridDetection,
        intersections: usize,
        calibration: &Calibration,
    ) -> QualityReport {
        let mut planner = FftPlanner::<f64>::new();
        let snr_db: BTreeMap<String, f64> = leads
            .iter()
            .filter(|l| l.status == LeadStatus::Extracted)
            .map(|l| (l.name.clone(), self.snr_db(&mut planner, l)))
            .collect();
        let mean_snr_db = if snr_db.is_empty() {
            0.0
        } else {
            snr_db.values().sum::<f64>() / snr_db.len() as f64
        };
        let grid_quality = self.grid_score(grid, intersections, calibration);
        let extracted: Vec<&LeadSignal> = leads
            .iter()
            .filter(|l| l.status == LeadStatus::Extracted)
            .collect();
        let signal_clarity = if extracted.is_empty() {
            0.0
        } else {
            extracted.iter().map(|l| clarity(&l.values)).sum::<f64>() / extracted.len() as f64
        };
        let completeness = self.completeness(leads);
        let overall = (0.4 * (mean_snr_db / MAX_SNR_DB)
            + 0.2 * grid_quality
            + 0.2 * signal_clarity
            + 0.2 * completeness.score)
            .clamp(0.0, 1.0);
        debug!(
            "quality: snr={:.1}dB grid={:.3} clarity={:.3} completeness={:.3} overall={:.3}",
            mean_snr_db, grid_quality, signal_clarity, completeness.score, overall
        );
        QualityReport {
            snr_db,
            mean_snr_db,
            grid_quality,
            signal_clarity,
            completeness,
            overall,
        }
    }

    fn snr_db(&self, planner: &mut FftPlanner<f64>, lead: &LeadSignal) -> f64 {
        band_snr_db(planner, &lead.values, lead.sampling_rate as f64, self.options.noise_band_hz)
    }

    /// `0.3·consistency + 0.2·lines + 0.2·intersections + 0.3·mean R²`.
    pub fn grid_score(&self, grid: &GridDetection, intersections: usize, calibration: &Calibration) -> f64 {
        let norm = |n: usize, target: usize| (n as f64 / target.max(1) as f64).min(1.0);
        0.3 * calibration.spacing_consistency.clamp(0.0, 1.0)
            + 0.2 * norm(grid.line_count(), self.options.target_lines)
            + 0.2 * norm(intersections, self.options.target_intersections)
            + 0.3 * grid.mean_r2().clamp(0.0, 1.0)
    }

    pub fn completeness(&self, leads: &[LeadSignal]) -> Completeness {
        let expected = self.options.expected_leads.max(1) as f64;
        let present = leads
            .iter()
            .filter(|l| l.status == LeadStatus::Extracted && !l.values.is_empty())
            .count() as f64;
        let varied = leads
            .iter()
            .filter(|l| std_dev(&l.values) > MIN_LEAD_STD_MV)
            .count() as f64;
        let mean_duration = if leads.is_empty() {
            0.0
        } else {
            leads
                .iter()
                .filter(|l| l.status == LeadStatus::Extracted)
                .map(|l| l.duration as f64)
                .sum::<f64>()
                / leads.len() as f64
        };
        let present_ratio = (present / expected).min(1.0);
        let variance_ratio = (varied / expected).min(1.0);
        let duration_ratio = (mean_duration / self.options.expected_duration_s.max(1e-6)).min(1.0);
        Completeness {
            present_ratio,
            variance_ratio,
            duration_ratio,
            score: (present_ratio + variance_ratio + duration_ratio) / 3.0,
        }
    }
}

/// SNR (dB) of `values` sampled at `fs`: 0.5–40 Hz power over `noise_band`
/// power, clamped to `[0, 60]`.
pub fn band_snr_db(
    planner: &mut FftPlanner<f64>,
    values: &[f32],
    fs: f64,
    noise_band: (f64, f64),
) -> f64 {
    let n = values.len();
    if n < 4 || fs <= 0.0 {
        return 0.0;
    }
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let mut buf: Vec<Complex<f64>> = values
        .iter()
        .map(|&v| Complex::new(v as f64 - mean, 0.0))
        .collect();
    planner.plan_fft_forward(n).process(&mut buf);
    let mut signal = 0.0;
    let mut noise = 0.0;
    for (k, c) in buf.iter().enumerate().take(n / 2 + 1) {
        let f = k as f64 * fs / n as f64;
        let p = c.norm_sqr();
        if f >= SIGNAL_BAND_HZ.0 && f < SIGNAL_BAND_HZ.1 {
            signal += p;
        } else if f >= noise_band.0 && f <= noise_band.1 {
            noise += p;
        }
    }
    if signal <= 1e-12 {
        return 0.0;
    }
    if noise <= 1e-12 * signal {
        return MAX_SNR_DB;
    }
    (10.0 * (signal / noise).log10()).clamp(0.0, MAX_SNR_DB)
}

/// Average of normalised contrast `min(1, 2·std/range)` and smoothness
/// `1 / (1 + mean|Δ| / std)`; 0 for a flat signal.
pub fn clarity(values: &[f32]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let std = std_dev(values);
    let (lo, hi) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = (hi - lo) as f64;
    if std <= MIN_LEAD_STD_MV || range <= 0.0 {
        return 0.0;
    }
    let contrast = (2.0 * std / range).min(1.0);
    let mean_grad = values
        .windows(2)
        .map(|w| (w[1] - w[0]).abs() as f64)
        .sum::<f64>()
        / (values.len() - 1) as f64;
    let smoothness = 1.0 / (1.0 + mean_grad / std);
    0.5 * (contrast + smoothness)
}

fn std_dev(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    (values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::DetectionMethod;
    use std::f32::consts::PI;

    fn lead(name: &str, values: Vec<f32>) -> LeadSignal {
        let duration = values.len() as f32 / 500.0;
        LeadSignal {
            name: name.into(),
            values,
            sampling_rate: 500,
            duration,
            status: LeadStatus::Extracted,
        }
    }

    fn tone(freq: f32, amp: f32) -> Vec<f32> {
        (0..1250)
            .map(|i| amp * (2.0 * PI * freq * i as f32 / 500.0).sin())
            .collect()
    }

    #[test]
    fn clean_tone_has_maximal_snr() {
        let mut planner = FftPlanner::new();
        let snr = band_snr_db(&mut planner, &tone(2.0, 1.0), 500.0, (40.0, 100.0));
        assert!(snr > 50.0, "{snr}");
        let noisy: Vec<f32> = tone(2.0, 1.0)
            .iter()
            .zip(tone(70.0, 1.0))
            .map(|(a, b)| a + b)
            .collect();
        let snr = band_snr_db(&mut planner, &noisy, 500.0, (40.0, 100.0));
        assert!(snr.abs() < 1.0, "{snr}");
    }

    #[test]
    fn smooth_signal_is_clearer_than_jitter() {
        let smooth = clarity(&tone(1.0, 1.0));
        let jitter: Vec<f32> = (0..1250).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(smooth > 0.8, "{smooth}");
        assert!(clarity(&jitter) < smooth);
        assert_eq!(clarity(&[0.0; 100]), 0.0);
    }

    #[test]
    fn full_set_of_leads_is_complete() {
        let leads: Vec<LeadSignal> = crate::types::STANDARD_LEADS
            .iter()
            .map(|n| lead(n, tone(1.0, 0.5)))
            .collect();
        let assessor = QualityAssessor::new(QualityOptions::default());
        let c = assessor.completeness(&leads);
        assert!((c.score - 1.0).abs() < 1e-9);

        let half = assessor.completeness(&leads[..6]);
        assert!((half.present_ratio - 0.5).abs() < 1e-9);
        assert!((half.duration_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overall_combines_weighted_parts() {
        let leads: Vec<LeadSignal> = crate::types::STANDARD_LEADS
            .iter()
            .map(|n| lead(n, tone(1.0, 0.5)))
            .collect();
        let grid = GridDetection::empty(DetectionMethod::Standard);
        let assessor = QualityAssessor::new(QualityOptions::default());
        let report = assessor.assess(&leads, &grid, 0, &Calibration::default());
        assert_eq!(report.snr_db.len(), 12);
        assert_eq!(report.grid_quality, 0.0);
        let expected = 0.4 * report.mean_snr_db / MAX_SNR_DB
            + 0.2 * report.signal_clarity
            + 0.2 * report.completeness.score;
        assert!((report.overall - expected).abs() < 1e-9);
    }
}
