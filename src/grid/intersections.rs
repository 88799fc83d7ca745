//! Numerical intersection of fitted horizontal and vertical grid lines.
//!
//! For each pair the horizontal line `y = h(x)` is sampled over the part of
//! its domain where the vertical line can be; the sample whose `v(h(x))`
//! lands closest to `x` is accepted when within tolerance and then refined
//! by the fixed-point iteration `x ← v(h(x))`, which contracts for
//! near-orthogonal families.
use crate::fit::GridLine;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const REFINE_ITERS: usize = 20;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionOptions {
    /// Largest `|v(h(x)) - x|` (pixels) accepted as a crossing.
    pub tolerance_px: f64,
    /// Sampling step (pixels) along the horizontal line.
    pub step_px: f64,
}

impl Default for IntersectionOptions {
    fn default() -> Self {
        Self {
            tolerance_px: 1.5,
            step_px: 0.5,
        }
    }
}

/// Crossing point with the indices of the contributing lines.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intersection {
    pub x: f64,
    pub y: f64,
    /// Index into the horizontal line slice.
    pub horizontal: usize,
    /// Index into the vertical line slice.
    pub vertical: usize,
}

pub struct IntersectionSolver {
    options: IntersectionOptions,
}

impl IntersectionSolver {
    pub fn new(options: IntersectionOptions) -> Self {
        Self { options }
    }

    /// All crossings between the two families, row-major by line index.
    pub fn solve(&self, horizontal: &[GridLine], vertical: &[GridLine]) -> Vec<Intersection> {
        let mut out = Vec::new();
        for (hi, h) in horizontal.iter().enumerate() {
            for (vi, v) in vertical.iter().enumerate() {
                if let Some([x, y]) = self.intersect(h, v) {
                    out.push(Intersection {
                        x,
                        y,
                        horizontal: hi,
                        vertical: vi,
                    });
                }
            }
        }
        debug!(
            "intersections: {}x{} lines -> {} crossings",
            horizontal.len(),
            vertical.len(),
            out.len()
        );
        out
    }

    /// Crossing of one horizontal and one vertical line, if their domains
    /// overlap and the curves meet within tolerance.
    pub fn intersect(&self, h: &GridLine, v: &GridLine) -> Option<[f64; 2]> {
        let tol = self.options.tolerance_px;
        let step = self.options.step_px.max(1e-3);

        // x extent swept by the vertical line over its own domain.
        let (vx_lo, vx_hi) = sweep(v, 16);
        let x0 = h.domain.0.max(vx_lo - tol);
        let x1 = h.domain.1.min(vx_hi + tol);
        if x0 > x1 {
            return None;
        }

        let mut best: Option<(f64, f64)> = None;
        let n = ((x1 - x0) / step).floor() as usize;
        for i in 0..=n {
            let x = (x0 + i as f64 * step).min(x1);
            let y = h.eval(x);
            if y < v.domain.0 - tol || y > v.domain.1 + tol {
                continue;
            }
            let diff = (v.eval(y) - x).abs();
            if best.map_or(true, |(_, d)| diff < d) {
                best = Some((x, diff));
            }
        }
        let (x_best, diff) = best?;
        if diff > tol {
            return None;
        }

        let mut x = x_best;
        for _ in 0..REFINE_ITERS {
            let next = v.eval(h.eval(x));
            if !next.is_finite() {
                break;
            }
            let delta = (next - x).abs();
            x = next;
            if delta < 1e-6 {
                break;
            }
        }
        if !x.is_finite() || (x - x_best).abs() > tol + step {
            x = x_best;
        }
        Some([x, h.eval(x)])
    }
}

fn sweep(line: &GridLine, samples: usize) -> (f64, f64) {
    let n = samples.max(2);
    (0..n)
        .map(|i| line.eval(line.domain.0 + line.domain_len() * i as f64 / (n - 1) as f64))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

/// Drop points closer than `radius` to an earlier kept point.
///
/// Kept points are bucketed into `radius`-sized cells, so each point is only
/// compared with the kept points of its 3×3 cell neighbourhood.
pub fn dedupe_intersections(points: Vec<Intersection>, radius: f64) -> Vec<Intersection> {
    if !(radius > 0.0 && radius.is_finite()) {
        return points;
    }
    let r2 = radius * radius;
    let cell = |v: f64| (v / radius).floor() as i64;
    let mut buckets: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    let mut kept: Vec<Intersection> = Vec::with_capacity(points.len());
    for p in points {
        let (cx, cy) = (cell(p.x), cell(p.y));
        let dup = (cx - 1..=cx + 1)
            .flat_map(|x| (cy - 1..=cy + 1).map(move |y| (x, y)))
            .filter_map(|key| buckets.get(&key))
            .flatten()
            .any(|&i| {
                let dx = p.x - kept[i].x;
                let dy = p.y - kept[i].y;
                dx * dx + dy * dy < r2
            });
        if !dup {
            buckets.entry((cx, cy)).or_default().push(kept.len());
            kept.push(p);
        }
    }
    kept
}
