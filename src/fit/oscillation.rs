//! Demotion of high-order fits that are straight lines in disguise.
use super::polynomial::fit_order;
use super::types::{eval_poly, Curvature, GridLine};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillationOptions {
    /// Largest polynomial-vs-linear deviation (pixels) still treated as straight.
    pub tolerance_px: f64,
    /// Samples drawn across the domain for the comparison.
    pub samples: usize,
}

impl Default for OscillationOptions {
    fn default() -> Self {
        Self {
            tolerance_px: 5.0,
            samples: 100,
        }
    }
}

pub struct OscillationValidator {
    options: OscillationOptions,
}

impl OscillationValidator {
    pub fn new(options: OscillationOptions) -> Self {
        Self { options }
    }

    /// Largest gap between the line's polynomial and a linear re-fit of its
    /// own samples, with that linear re-fit. `None` for order-1 lines.
    pub fn linear_deviation(&self, line: &GridLine) -> Option<(f64, Vec<f64>)> {
        if line.order <= 1 {
            return None;
        }
        let n = self.options.samples.max(2);
        let t: Vec<f64> = (0..n)
            .map(|i| {
                let u = line.domain.0 + line.domain_len() * i as f64 / (n - 1) as f64;
                line.normalize(u)
            })
            .collect();
        let v: Vec<f64> = t
            .iter()
            .map(|&ti| eval_poly(&line.coefficients, ti))
            .collect();
        let linear = fit_order(&t, &v, 1)?;
        let max_dev = t
            .iter()
            .zip(&v)
            .map(|(&ti, &vi)| (vi - eval_poly(&linear.coefficients, ti)).abs())
            .fold(0.0f64, f64::max);
        Some((max_dev, linear.coefficients))
    }

    /// Return `line`, demoted to order 1 if it deviates from its own linear
    /// re-fit by less than the tolerance. Order never increases.
    pub fn validate(&self, mut line: GridLine) -> GridLine {
        let Some((max_dev, linear)) = self.linear_deviation(&line) else {
            return line;
        };
        if max_dev >= self.options.tolerance_px {
            return line;
        }
        debug!(
            "oscillation: {} line at {:.1} demoted from order {} (max deviation {:.2}px)",
            line.orientation.as_str(),
            line.position(),
            line.order,
            max_dev
        );
        line.order = 1;
        line.coefficients = linear;
        line.extrema_count = 0;
        line.curvature = Curvature::None;
        line.monotonic = true;
        line.demoted = true;
        if let Some(fit) = line.fit_table.iter().find(|f| f.order == 1) {
            line.r2 = fit.r2;
            line.max_deviation = fit.max_deviation;
            line.mean_deviation = fit.mean_abs_error;
        }
        line
    }

    /// Validate a batch of lines, returning them with the number demoted.
    pub fn validate_all(&self, lines: Vec<GridLine>) -> (Vec<GridLine>, usize) {
        let out: Vec<GridLine> = lines.into_iter().map(|l| self.validate(l)).collect();
        let demoted = out.iter().filter(|l| l.demoted).count();
        (out, demoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angle::Orientation;
    use crate::fit::{FitOptions, PolynomialLineFitter};

    fn wobbly_points(amplitude: f32) -> Vec<[f32; 2]> {
        (0..200)
            .map(|i| {
                let x = i as f32 * 2.0;
                let y = 100.0 + 0.05 * x + amplitude * ((x - 200.0) / 200.0).powi(2);
                [x, y]
            })
            .collect()
    }

    #[test]
    fn small_bow_is_demoted_and_stays_demoted() {
        let fitter = PolynomialLineFitter::new(FitOptions::default());
        let line = fitter
            .fit_points(Orientation::Horizontal, &wobbly_points(2.0))
            .expect("line");
        assert!(line.order >= 2);
        let validator = OscillationValidator::new(OscillationOptions::default());
        let once = validator.validate(line);
        assert_eq!(once.order, 1);
        assert!(once.demoted);
        assert_eq!(once.coefficients.len(), 2);
        let twice = validator.validate(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn real_curvature_is_kept() {
        let fitter = PolynomialLineFitter::new(FitOptions::default());
        let line = fitter
            .fit_points(Orientation::Horizontal, &wobbly_points(30.0))
            .expect("line");
        let order = line.order;
        let validator = OscillationValidator::new(OscillationOptions::default());
        let kept = validator.validate(line);
        assert_eq!(kept.order, order);
        assert!(!kept.demoted);
    }
}
