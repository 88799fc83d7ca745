//! Fixed filter chain applied to every extracted lead.
//!
//! Order: 0.5 Hz high-pass (baseline wander), 4th-order 100 Hz low-pass,
//! then 50 Hz and 60 Hz notches. Each stage runs zero-phase; stages whose
//! frequency reaches 95% of Nyquist are skipped.
use super::filters::{filtfilt, Biquad};
use crate::types::{LeadSignal, LeadStatus};
use log::debug;
use serde::{Deserialize, Serialize};

const BUTTERWORTH_Q2: f64 = std::f64::consts::FRAC_1_SQRT_2;
const BUTTERWORTH_Q4: [f64; 2] = [0.541_196_1, 1.306_563];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    pub enabled: bool,
    pub highpass_hz: f64,
    pub lowpass_hz: f64,
    pub notch_hz: Vec<f64>,
    pub notch_q: f64,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            highpass_hz: 0.5,
            lowpass_hz: 100.0,
            notch_hz: vec![50.0, 60.0],
            notch_q: 30.0,
        }
    }
}

/// One designed stage of the chain.
#[derive(Clone, Debug, Serialize)]
pub struct FilterStage {
    pub name: String,
    pub sections: Vec<Biquad>,
}

pub struct SignalPostProcessor {
    options: FilterOptions,
}

impl SignalPostProcessor {
    pub fn new(options: FilterOptions) -> Self {
        Self { options }
    }

    /// Stages applicable at `sampling_rate`, in application order.
    pub fn design(&self, sampling_rate: f64) -> Vec<FilterStage> {
        let o = &self.options;
        let limit = 0.95 * sampling_rate / 2.0;
        let usable = |f: f64| f > 0.0 && f < limit;
        let mut stages = Vec::new();
        if usable(o.highpass_hz) {
            stages.push(FilterStage {
                name: format!("highpass_{}hz", o.highpass_hz),
                sections: vec![Biquad::highpass(sampling_rate, o.highpass_hz, BUTTERWORTH_Q2)],
            });
        }
        if usable(o.lowpass_hz) {
            stages.push(FilterStage {
                name: format!("lowpass_{}hz", o.lowpass_hz),
                sections: BUTTERWORTH_Q4
                    .iter()
                    .map(|&q| Biquad::lowpass(sampling_rate, o.lowpass_hz, q))
                    .collect(),
            });
        }
        for &f in &o.notch_hz {
            if usable(f) {
                stages.push(FilterStage {
                    name: format!("notch_{}hz", f),
                    sections: vec![Biquad::notch(sampling_rate, f, o.notch_q)],
                });
            }
        }
        stages
    }

    pub fn process(&self, values: &[f32], sampling_rate: u32) -> Vec<f32> {
        if !self.options.enabled || values.is_empty() || sampling_rate == 0 {
            return values.to_vec();
        }
        let stages = self.design(sampling_rate as f64);
        let mut out = values.to_vec();
        for stage in &stages {
            out = filtfilt(&stage.sections, &out);
        }
        debug!("post-process: {} stages on {} samples", stages.len(), values.len());
        out
    }

    /// Filtered copy of `lead`; zero-filled leads are returned unchanged.
    pub fn process_lead(&self, lead: &LeadSignal) -> LeadSignal {
        if lead.status == LeadStatus::ZeroFilled {
            return lead.clone();
        }
        LeadSignal {
            values: self.process(&lead.values, lead.sampling_rate),
            ..lead.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, amp: f32, fs: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| amp * (2.0 * PI * freq * i as f32 / fs).sin())
            .collect()
    }

    fn rms(x: &[f32]) -> f32 {
        (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt()
    }

    #[test]
    fn removes_powerline_and_keeps_band() {
        let fs = 500.0;
        let n = 2500;
        let clean = tone(5.0, 1.0, fs, n);
        let hum = tone(60.0, 0.5, fs, n);
        let noisy: Vec<f32> = clean.iter().zip(&hum).map(|(a, b)| a + b).collect();
        let pp = SignalPostProcessor::new(FilterOptions::default());
        let out = pp.process(&noisy, 500);
        let err: Vec<f32> = out[250..2250]
            .iter()
            .zip(&clean[250..2250])
            .map(|(a, b)| a - b)
            .collect();
        assert!(rms(&err) < 0.05, "residual rms {}", rms(&err));
    }

    #[test]
    fn removes_baseline_offset() {
        let fs = 500.0;
        let x: Vec<f32> = tone(8.0, 1.0, fs, 2500).iter().map(|v| v + 2.0).collect();
        let out = SignalPostProcessor::new(FilterOptions::default()).process(&x, 500);
        let mean: f32 = out[500..2000].iter().sum::<f32>() / 1500.0;
        assert!(mean.abs() < 0.1, "mean {mean}");
    }

    #[test]
    fn stages_above_nyquist_are_skipped() {
        let pp = SignalPostProcessor::new(FilterOptions::default());
        let names: Vec<String> = pp.design(100.0).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["highpass_0.5hz".to_string()]);
        assert_eq!(pp.design(500.0).len(), 4);
    }

    #[test]
    fn zero_filled_leads_are_untouched() {
        let lead = LeadSignal::zero_filled("V3", 500, 2.5);
        let pp = SignalPostProcessor::new(FilterOptions::default());
        assert_eq!(pp.process_lead(&lead), lead);
    }
}
