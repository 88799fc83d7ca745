//! Second-order IIR sections (RBJ cookbook) and zero-phase filtering.
use serde::Serialize;
use std::f64::consts::PI;

/// Normalised biquad `(b0, b1, b2, a1, a2)` with `a0 = 1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    fn normalized(b: [f64; 3], a: [f64; 3]) -> Self {
        Self {
            b0: b[0] / a[0],
            b1: b[1] / a[0],
            b2: b[2] / a[0],
            a1: a[1] / a[0],
            a2: a[2] / a[0],
        }
    }

    fn prewarp(fs: f64, f0: f64, q: f64) -> (f64, f64) {
        let w0 = 2.0 * PI * f0 / fs;
        (w0.cos(), w0.sin() / (2.0 * q))
    }

    pub fn lowpass(fs: f64, f0: f64, q: f64) -> Self {
        let (c, alpha) = Self::prewarp(fs, f0, q);
        Self::normalized(
            [(1.0 - c) / 2.0, 1.0 - c, (1.0 - c) / 2.0],
            [1.0 + alpha, -2.0 * c, 1.0 - alpha],
        )
    }

    pub fn highpass(fs: f64, f0: f64, q: f64) -> Self {
        let (c, alpha) = Self::prewarp(fs, f0, q);
        Self::normalized(
            [(1.0 + c) / 2.0, -(1.0 + c), (1.0 + c) / 2.0],
            [1.0 + alpha, -2.0 * c, 1.0 - alpha],
        )
    }

    pub fn notch(fs: f64, f0: f64, q: f64) -> Self {
        let (c, alpha) = Self::prewarp(fs, f0, q);
        Self::normalized([1.0, -2.0 * c, 1.0], [1.0 + alpha, -2.0 * c, 1.0 - alpha])
    }

    /// DC gain `H(1)`.
    pub fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < 1e-12 {
            return 0.0;
        }
        (self.b0 + self.b1 + self.b2) / den
    }

    /// Direct form II transposed, with the state initialised to the steady
    /// state of a constant input equal to `x[0]`.
    pub fn process(&self, x: &[f64]) -> Vec<f64> {
        let x0 = x.first().copied().unwrap_or(0.0);
        let y0 = self.dc_gain() * x0;
        let mut z1 = y0 - self.b0 * x0;
        let mut z2 = self.b2 * x0 - self.a2 * y0;
        x.iter()
            .map(|&xn| {
                let y = self.b0 * xn + z1;
                z1 = self.b1 * xn - self.a1 * y + z2;
                z2 = self.b2 * xn - self.a2 * y;
                y
            })
            .collect()
    }

    /// Magnitude response at `f` Hz.
    pub fn gain(&self, fs: f64, f: f64) -> f64 {
        let w = 2.0 * PI * f / fs;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);
        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

/// Forward-backward filtering through every section, with odd reflection
/// padding at both ends to tame edge transients.
pub fn filtfilt(sections: &[Biquad], x: &[f32]) -> Vec<f32> {
    let n = x.len();
    if n == 0 || sections.is_empty() {
        return x.to_vec();
    }
    let pad = (6 * sections.len() + 3).min(n - 1);
    let mut ext: Vec<f64> = Vec::with_capacity(n + 2 * pad);
    let first = x[0] as f64;
    let last = x[n - 1] as f64;
    for i in (1..=pad).rev() {
        ext.push(2.0 * first - x[i] as f64);
    }
    ext.extend(x.iter().map(|&v| v as f64));
    for i in 1..=pad {
        ext.push(2.0 * last - x[n - 1 - i] as f64);
    }

    let mut y = ext;
    for s in sections {
        y = s.process(&y);
    }
    y.reverse();
    for s in sections {
        y = s.process(&y);
    }
    y.reverse();
    y[pad..pad + n].iter().map(|&v| v as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responses_have_expected_shape() {
        let fs = 500.0;
        let lp = Biquad::lowpass(fs, 100.0, std::f64::consts::FRAC_1_SQRT_2);
        assert!((lp.gain(fs, 1.0) - 1.0).abs() < 1e-3);
        assert!((lp.gain(fs, 100.0) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3);
        assert!(lp.gain(fs, 240.0) < 0.1);

        let hp = Biquad::highpass(fs, 0.5, std::f64::consts::FRAC_1_SQRT_2);
        assert!(hp.gain(fs, 0.05) < 0.02);
        assert!((hp.gain(fs, 10.0) - 1.0).abs() < 1e-3);

        let notch = Biquad::notch(fs, 50.0, 30.0);
        assert!(notch.gain(fs, 50.0) < 1e-6);
        assert!((notch.gain(fs, 40.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn filtfilt_has_no_phase_lag() {
        let fs = 500.0;
        let x: Vec<f32> = (0..1000)
            .map(|i| (2.0 * std::f32::consts::PI * 5.0 * i as f32 / fs as f32).sin())
            .collect();
        let lp = Biquad::lowpass(fs, 100.0, 0.7071);
        let y = filtfilt(&[lp], &x);
        for i in 100..900 {
            assert!((y[i] - x[i]).abs() < 0.01, "sample {i}: {} vs {}", y[i], x[i]);
        }
    }

    #[test]
    fn constant_input_starts_in_steady_state() {
        let hp = Biquad::highpass(500.0, 0.5, 0.7071);
        let y = hp.process(&[3.0; 50]);
        assert!(y.iter().all(|v| v.abs() < 1e-9));
        let lp = Biquad::lowpass(500.0, 100.0, 0.7071);
        let y = lp.process(&[3.0; 50]);
        assert!(y.iter().all(|v| (v - 3.0).abs() < 1e-9));
    }

    #[test]
    fn short_inputs_pass_through() {
        let lp = Biquad::lowpass(500.0, 100.0, 0.7071);
        assert!(filtfilt(&[lp], &[]).is_empty());
        assert_eq!(filtfilt(&[lp], &[1.0]).len(), 1);
    }
}
