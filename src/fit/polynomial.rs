//! Least-squares polynomial fitting of line clusters with elbow order
//! selection.
//!
//! Every order `1..=max_order` is solved on a Vandermonde system in the
//! normalised abscissa `t ∈ [-1, 1]`; the SVD solve rejects rank-deficient
//! systems, in which case that order is skipped and the others still run.
//! The recommended order starts at 1 and is raised only while R² keeps
//! improving by more than `r2_improvement`.
use super::types::{derivative, eval_poly, Curvature, DeviationHistogram, GridLine, PolyFit};
use crate::angle::Orientation;
use crate::lines::LineCluster;
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Imaginary-part and merge tolerance for derivative roots.
const ROOT_TOL: f64 = 1e-6;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub max_order: usize,
    /// Minimum R² gain that justifies one more order.
    pub r2_improvement: f64,
    /// Linear R² at or above which order 1 is taken unconditionally.
    pub near_perfect_r2: f64,
    pub min_points: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_order: 5,
            r2_improvement: 1e-3,
            near_perfect_r2: 0.9999,
            min_points: 8,
        }
    }
}

pub struct PolynomialLineFitter {
    options: FitOptions,
}

impl PolynomialLineFitter {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    /// Fit every cluster; clusters with no successful order are dropped.
    pub fn fit_all(&self, clusters: &[LineCluster]) -> Vec<GridLine> {
        let lines: Vec<GridLine> = clusters.iter().filter_map(|c| self.fit_cluster(c)).collect();
        debug!(
            "polynomial fitter: {} clusters -> {} lines",
            clusters.len(),
            lines.len()
        );
        lines
    }

    pub fn fit_cluster(&self, cluster: &LineCluster) -> Option<GridLine> {
        self.fit_points(cluster.orientation, &cluster.points)
    }

    /// Fit `v = f(u)` through image points of one line.
    pub fn fit_points(&self, orientation: Orientation, points: &[[f32; 2]]) -> Option<GridLine> {
        if points.len() < self.options.min_points.max(2) {
            return None;
        }
        let (u, v): (Vec<f64>, Vec<f64>) = points
            .iter()
            .map(|p| match orientation {
                Orientation::Horizontal => (p[0] as f64, p[1] as f64),
                Orientation::Vertical => (p[1] as f64, p[0] as f64),
            })
            .unzip();
        let (u_min, u_max) = u
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
        let center = 0.5 * (u_min + u_max);
        let scale = (0.5 * (u_max - u_min)).max(1.0);
        let t: Vec<f64> = u.iter().map(|&x| (x - center) / scale).collect();

        let mut table = Vec::with_capacity(self.options.max_order);
        for order in 1..=self.options.max_order.max(1) {
            if t.len() < (order + 1).max(self.options.min_points) {
                continue;
            }
            if let Some(fit) = fit_order(&t, &v, order) {
                table.push(fit);
            }
        }
        let chosen = select_order(&table, &self.options)?;
        let fit = table[chosen].clone();
        Some(GridLine::from_fit(
            orientation,
            &fit,
            center,
            scale,
            (u_min, u_max),
            points.len(),
            table,
        ))
    }
}

/// Index into `table` of the recommended fit.
///
/// `table` must be sorted by ascending order.
pub fn select_order(table: &[PolyFit], options: &FitOptions) -> Option<usize> {
    let first = table.first()?;
    if first.order == 1 && first.r2 >= options.near_perfect_r2 {
        return Some(0);
    }
    let mut best = 0;
    for (i, fit) in table.iter().enumerate().skip(1) {
        if fit.r2 - table[best].r2 > options.r2_improvement {
            best = i;
        } else {
            break;
        }
    }
    Some(best)
}

/// Solve one order on normalised abscissae `t` and compute its metrics.
pub fn fit_order(t: &[f64], v: &[f64], order: usize) -> Option<PolyFit> {
    let n = t.len();
    let cols = order + 1;
    if n < cols {
        return None;
    }
    let a = DMatrix::from_fn(n, cols, |r, c| t[r].powi(c as i32));
    let b = DVector::from_column_slice(v);
    let svd = a.svd(true, true);
    if svd.rank(1e-10) < cols {
        return None;
    }
    let sol = svd.solve(&b, 1e-12).ok()?;
    let coefficients: Vec<f64> = sol.iter().copied().collect();
    if coefficients.iter().any(|c| !c.is_finite()) {
        return None;
    }

    let mean = v.iter().sum::<f64>() / n as f64;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    let mut abs_sum = 0.0;
    let mut max_dev = 0.0f64;
    let mut histogram = DeviationHistogram::default();
    for (&ti, &vi) in t.iter().zip(v) {
        let r = vi - eval_poly(&coefficients, ti);
        ss_res += r * r;
        ss_tot += (vi - mean) * (vi - mean);
        abs_sum += r.abs();
        max_dev = max_dev.max(r.abs());
        histogram.record(r.abs());
    }
    let tiny = 1e-12 * n as f64;
    let r2 = if ss_tot <= tiny {
        if ss_res <= tiny {
            1.0
        } else {
            0.0
        }
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };
    let extrema_count = count_extrema(&coefficients);
    Some(PolyFit {
        order,
        coefficients,
        r2,
        rmse: (ss_res / n as f64).sqrt(),
        mean_abs_error: abs_sum / n as f64,
        max_deviation: max_dev,
        histogram,
        extrema_count,
        curvature: Curvature::from_extrema(extrema_count),
        monotonic: extrema_count == 0,
    })
}

/// Distinct real roots of the derivative in `t ∈ [-1, 1]`.
///
/// Roots are the eigenvalues of the companion matrix of the derivative, so
/// a tangent (double) root counts once and closely spaced roots are kept
/// apart.
pub fn count_extrema(coefficients: &[f64]) -> usize {
    let mut d = derivative(coefficients);
    let scale = d.iter().fold(0.0f64, |m, c| m.max(c.abs()));
    // Flat to within a nanopixel over the domain.
    if scale <= 1e-9 {
        return 0;
    }
    while d.last().is_some_and(|c| c.abs() <= scale * 1e-12) {
        d.pop();
    }
    let n = d.len().saturating_sub(1);
    if n == 0 {
        return 0;
    }
    let lead = d[n];
    let companion = DMatrix::from_fn(n, n, |r, c| {
        if c == n - 1 {
            -d[r] / lead
        } else if r == c + 1 {
            1.0
        } else {
            0.0
        }
    });
    let mut roots: Vec<f64> = companion
        .complex_eigenvalues()
        .iter()
        .filter(|z| z.im.abs() <= ROOT_TOL * (1.0 + z.re.abs()))
        .map(|z| z.re)
        .filter(|t| (-1.0 - ROOT_TOL..=1.0 + ROOT_TOL).contains(t))
        .collect();
    roots.sort_by(|a, b| a.total_cmp(b));
    roots.dedup_by(|a, b| (*a - *b).abs() <= ROOT_TOL);
    roots.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(f: impl Fn(f32) -> f32, n: usize, step: f32) -> Vec<[f32; 2]> {
        (0..n)
            .map(|i| {
                let x = i as f32 * step;
                [x, f(x)]
            })
            .collect()
    }

    #[test]
    fn straight_line_is_order_one() {
        let pts = sample(|x| 0.2 * x + 10.0, 150, 2.0);
        let fitter = PolynomialLineFitter::new(FitOptions::default());
        let line = fitter
            .fit_points(Orientation::Horizontal, &pts)
            .expect("line");
        assert_eq!(line.order, 1);
        assert!(line.r2 >= 0.9999);
        assert!((line.eval(100.0) - 30.0).abs() < 1e-3);
        assert_eq!(line.curvature, Curvature::None);
        assert!(line.monotonic);
    }

    #[test]
    fn quadratic_recommends_order_two() {
        let pts = sample(|x| 50.0 + 0.002 * (x - 150.0).powi(2), 151, 2.0);
        let fitter = PolynomialLineFitter::new(FitOptions::default());
        let line = fitter
            .fit_points(Orientation::Horizontal, &pts)
            .expect("line");
        assert_eq!(line.order, 2);
        assert_eq!(line.extrema_count, 1);
        assert_eq!(line.curvature, Curvature::Single);
        assert!(!line.monotonic);
        let r2: Vec<f64> = line.fit_table.iter().map(|f| f.r2).collect();
        assert!(r2[1] > r2[0]);
        assert!(r2[2] - r2[1] <= 1e-3);
    }

    #[test]
    fn vertical_lines_fit_x_of_y() {
        let pts: Vec<[f32; 2]> = (0..100).map(|i| [42.0, i as f32]).collect();
        let fitter = PolynomialLineFitter::new(FitOptions::default());
        let line = fitter.fit_points(Orientation::Vertical, &pts).expect("line");
        assert_eq!(line.order, 1);
        assert!((line.position() - 42.0).abs() < 1e-9);
        assert_eq!(line.domain, (0.0, 99.0));
    }

    #[test]
    fn orders_beyond_point_count_are_skipped() {
        let pts = sample(|x| x, 4, 1.0);
        let fitter = PolynomialLineFitter::new(FitOptions {
            min_points: 2,
            ..Default::default()
        });
        let line = fitter
            .fit_points(Orientation::Horizontal, &pts)
            .expect("line");
        assert!(line.fit_table.iter().all(|f| f.order <= 3));
    }

    #[test]
    fn degenerate_abscissa_is_rejected() {
        // All points share u, so every order is rank deficient.
        let pts: Vec<[f32; 2]> = (0..20).map(|i| [5.0, i as f32]).collect();
        let fitter = PolynomialLineFitter::new(FitOptions::default());
        assert!(fitter.fit_points(Orientation::Horizontal, &pts).is_none());
    }

    #[test]
    fn extrema_are_derivative_roots_in_domain() {
        // p'(t) = 3t²: one tangent root at 0.
        assert_eq!(count_extrema(&[0.0, 0.0, 0.0, 1.0]), 1);
        // p'(t) = t² - 1e-6: roots at ±0.001.
        assert_eq!(count_extrema(&[0.0, -1e-6, 0.0, 1.0 / 3.0]), 2);
        // p(t) = (t - 3)²: the minimum lies outside [-1, 1].
        assert_eq!(count_extrema(&[9.0, -6.0, 1.0]), 0);
        // Straight and constant lines.
        assert_eq!(count_extrema(&[4.0, 2.0]), 0);
        assert_eq!(count_extrema(&[4.0]), 0);
    }

    #[test]
    fn elbow_stops_at_first_marginal_gain() {
        let fit = |order, r2| PolyFit {
            order,
            coefficients: vec![0.0; order + 1],
            r2,
            rmse: 0.0,
            mean_abs_error: 0.0,
            max_deviation: 0.0,
            histogram: DeviationHistogram::default(),
            extrema_count: 0,
            curvature: Curvature::None,
            monotonic: true,
        };
        let opts = FitOptions::default();
        let table = vec![fit(1, 0.90), fit(2, 0.95), fit(3, 0.9505), fit(4, 0.99)];
        assert_eq!(select_order(&table, &opts), Some(1));
        let table = vec![fit(1, 0.99995), fit(2, 1.0)];
        assert_eq!(select_order(&table, &opts), Some(0));
        assert_eq!(select_order(&[], &opts), None);
    }
}
