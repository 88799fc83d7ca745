use crate::angle::Orientation;
use serde::{Deserialize, Serialize};

/// Shape class derived from the number of derivative roots in the domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curvature {
    #[default]
    None,
    Single,
    Multiple,
}

impl Curvature {
    pub fn from_extrema(count: usize) -> Self {
        match count {
            0 => Curvature::None,
            1 => Curvature::Single,
            _ => Curvature::Multiple,
        }
    }
}

/// Residual counts per pixel-error bucket: `[0,1)`, `[1,2)`, `[2,5)`,
/// `[5,10)` and `[10,∞)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviationHistogram {
    pub below_1px: usize,
    pub below_2px: usize,
    pub below_5px: usize,
    pub below_10px: usize,
    pub above_10px: usize,
}

impl DeviationHistogram {
    pub fn record(&mut self, abs_residual: f64) {
        match abs_residual {
            r if r < 1.0 => self.below_1px += 1,
            r if r < 2.0 => self.below_2px += 1,
            r if r < 5.0 => self.below_5px += 1,
            r if r < 10.0 => self.below_10px += 1,
            _ => self.above_10px += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.below_1px + self.below_2px + self.below_5px + self.below_10px + self.above_10px
    }
}

/// Least-squares fit of one polynomial order.
///
/// Coefficients are in ascending powers of the normalised abscissa
/// `t = (u - center) / scale` of the owning line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolyFit {
    pub order: usize,
    pub coefficients: Vec<f64>,
    pub r2: f64,
    pub rmse: f64,
    pub mean_abs_error: f64,
    pub max_deviation: f64,
    pub histogram: DeviationHistogram,
    pub extrema_count: usize,
    pub curvature: Curvature,
    pub monotonic: bool,
}

/// Fitted grid line.
///
/// Horizontal lines are `y = f(x)`, vertical lines are `x = f(y)`. The
/// abscissa `u` is x for horizontal and y for vertical lines; `domain` is the
/// `u` interval covered by the supporting points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLine {
    pub orientation: Orientation,
    pub order: usize,
    pub coefficients: Vec<f64>,
    pub center: f64,
    pub scale: f64,
    pub domain: (f64, f64),
    pub r2: f64,
    pub max_deviation: f64,
    pub mean_deviation: f64,
    pub extrema_count: usize,
    pub curvature: Curvature,
    pub monotonic: bool,
    pub point_count: usize,
    /// Set when the oscillation check forced the line back to order 1.
    pub demoted: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fit_table: Vec<PolyFit>,
}

impl GridLine {
    /// Line whose recommended fit is `fit`.
    pub fn from_fit(
        orientation: Orientation,
        fit: &PolyFit,
        center: f64,
        scale: f64,
        domain: (f64, f64),
        point_count: usize,
        fit_table: Vec<PolyFit>,
    ) -> Self {
        Self {
            orientation,
            order: fit.order,
            coefficients: fit.coefficients.clone(),
            center,
            scale,
            domain,
            r2: fit.r2,
            max_deviation: fit.max_deviation,
            mean_deviation: fit.mean_abs_error,
            extrema_count: fit.extrema_count,
            curvature: fit.curvature,
            monotonic: fit.monotonic,
            point_count,
            demoted: false,
            fit_table,
        }
    }

    /// Constant line `v = value` over `domain`.
    pub fn constant(orientation: Orientation, value: f64, domain: (f64, f64)) -> Self {
        let center = 0.5 * (domain.0 + domain.1);
        let scale = (0.5 * (domain.1 - domain.0)).max(1.0);
        Self {
            orientation,
            order: 1,
            coefficients: vec![value, 0.0],
            center,
            scale,
            domain,
            r2: 1.0,
            max_deviation: 0.0,
            mean_deviation: 0.0,
            extrema_count: 0,
            curvature: Curvature::None,
            monotonic: true,
            point_count: 0,
            demoted: false,
            fit_table: Vec::new(),
        }
    }

    #[inline]
    pub fn normalize(&self, u: f64) -> f64 {
        (u - self.center) / self.scale
    }

    /// Evaluate `v = f(u)`.
    #[inline]
    pub fn eval(&self, u: f64) -> f64 {
        eval_poly(&self.coefficients, self.normalize(u))
    }

    /// Representative coordinate: y of a horizontal line (x of a vertical
    /// one) at the middle of its domain.
    pub fn position(&self) -> f64 {
        self.eval(0.5 * (self.domain.0 + self.domain.1))
    }

    /// Image point `(x, y)` at abscissa `u`.
    pub fn point_at(&self, u: f64) -> [f64; 2] {
        let v = self.eval(u);
        match self.orientation {
            Orientation::Horizontal => [u, v],
            Orientation::Vertical => [v, u],
        }
    }

    pub fn domain_len(&self) -> f64 {
        self.domain.1 - self.domain.0
    }

    /// Shift the line by `(dx, dy)` image pixels.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        let (du, dv) = match self.orientation {
            Orientation::Horizontal => (dx, dy),
            Orientation::Vertical => (dy, dx),
        };
        self.center += du;
        self.domain = (self.domain.0 + du, self.domain.1 + du);
        if let Some(c0) = self.coefficients.first_mut() {
            *c0 += dv;
        }
    }
}

/// Horner evaluation of ascending-power coefficients.
#[inline]
pub fn eval_poly(coefficients: &[f64], t: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * t + c)
}

/// Ascending-power coefficients of the derivative.
pub fn derivative(coefficients: &[f64]) -> Vec<f64> {
    coefficients
        .iter()
        .enumerate()
        .skip(1)
        .map(|(k, &c)| k as f64 * c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horner_matches_expansion() {
        let c = [1.0, -2.0, 0.5];
        let t = 3.0;
        assert!((eval_poly(&c, t) - (1.0 - 6.0 + 4.5)).abs() < 1e-12);
        assert_eq!(derivative(&c), vec![-2.0, 1.0]);
    }

    #[test]
    fn translate_moves_both_axes() {
        let mut h = GridLine::constant(Orientation::Horizontal, 20.0, (0.0, 100.0));
        h.translate(50.0, 5.0);
        assert_eq!(h.domain, (50.0, 150.0));
        assert!((h.eval(120.0) - 25.0).abs() < 1e-12);

        let mut v = GridLine::constant(Orientation::Vertical, 30.0, (0.0, 80.0));
        v.translate(10.0, -4.0);
        assert_eq!(v.domain, (-4.0, 76.0));
        assert_eq!(v.point_at(10.0), [40.0, 10.0]);
    }

    #[test]
    fn histogram_buckets() {
        let mut h = DeviationHistogram::default();
        for r in [0.2, 1.5, 3.0, 7.0, 12.0, 0.9] {
            h.record(r);
        }
        assert_eq!(h.below_1px, 2);
        assert_eq!(h.above_10px, 1);
        assert_eq!(h.total(), 6);
    }
}
