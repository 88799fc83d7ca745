//! Standard Hough transform restricted to the two grid bands.
//!
//! Lines are parameterised by their normal: `x·cos θ + y·sin θ = ρ`. Only
//! normals within `band_deg` of 0° (vertical lines) and of 90° (horizontal
//! lines) are accumulated; segments outside both bands would be discarded
//! anyway. `θ` for vertical lines runs through negative angles so a band
//! never wraps.
use crate::image::BinaryMask;

pub type Votes = u32;

/// Accumulator peak.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoughPeak {
    pub rho: f32,
    pub theta_deg: f32,
    pub votes: Votes,
}

impl HoughPeak {
    /// Unit normal `(cos θ, sin θ)`.
    pub fn normal(&self) -> [f32; 2] {
        let t = self.theta_deg.to_radians();
        [t.cos(), t.sin()]
    }
}

pub struct HoughAccumulator {
    data: Vec<Votes>,
    rho_bins: usize,
    max_rho: f32,
    thetas_deg: Vec<f32>,
    cos_table: Vec<f32>,
    sin_table: Vec<f32>,
}

impl HoughAccumulator {
    /// Build an accumulator for a `width × height` raster with 1° bins over
    /// `[-band, band] ∪ [90 - band, 90 + band]`.
    pub fn new(width: usize, height: usize, band_deg: f32) -> Self {
        let max_rho = ((width * width + height * height) as f32).sqrt().ceil();
        let rho_bins = (2.0 * max_rho) as usize + 1;
        let band = band_deg.clamp(0.0, 44.0).round() as i32;
        let mut thetas_deg = Vec::with_capacity(4 * band as usize + 2);
        for t in -band..=band {
            thetas_deg.push(t as f32);
        }
        for t in (90 - band)..=(90 + band) {
            thetas_deg.push(t as f32);
        }
        let cos_table = thetas_deg.iter().map(|t| t.to_radians().cos()).collect();
        let sin_table = thetas_deg.iter().map(|t| t.to_radians().sin()).collect();
        Self {
            data: vec![0; rho_bins * thetas_deg.len()],
            rho_bins,
            max_rho,
            thetas_deg,
            cos_table,
            sin_table,
        }
    }

    #[inline]
    fn rho_to_index(&self, rho: f32) -> usize {
        let idx = (rho + self.max_rho).round() as isize;
        idx.clamp(0, self.rho_bins as isize - 1) as usize
    }

    #[inline]
    fn index_to_rho(&self, index: usize) -> f32 {
        index as f32 - self.max_rho
    }

    #[inline]
    pub fn votes(&self, theta_idx: usize, rho_idx: usize) -> Votes {
        self.data[theta_idx * self.rho_bins + rho_idx]
    }

    /// Vote every set pixel of `mask` into every theta bin.
    pub fn accumulate(&mut self, mask: &BinaryMask) {
        for (x, y) in mask.iter_set() {
            let (xf, yf) = (x as f32, y as f32);
            for t in 0..self.thetas_deg.len() {
                let rho = xf * self.cos_table[t] + yf * self.sin_table[t];
                let r = self.rho_to_index(rho);
                let idx = t * self.rho_bins + r;
                self.data[idx] = self.data[idx].saturating_add(1);
            }
        }
    }

    /// Local maxima with at least `min_votes`, strongest first.
    ///
    /// A bin survives non-maximum suppression when no bin within
    /// `nms_rho` rho bins and `nms_theta_deg` degrees has more votes; ties
    /// are broken towards the lower index so a plateau yields one peak.
    pub fn peaks(&self, min_votes: Votes, nms_rho: usize, nms_theta_deg: f32) -> Vec<HoughPeak> {
        let n_theta = self.thetas_deg.len();
        let mut peaks = Vec::new();
        for t in 0..n_theta {
            for r in 0..self.rho_bins {
                let votes = self.votes(t, r);
                if votes < min_votes {
                    continue;
                }
                if self.is_local_max(t, r, votes, nms_rho, nms_theta_deg) {
                    peaks.push(HoughPeak {
                        rho: self.index_to_rho(r),
                        theta_deg: self.thetas_deg[t],
                        votes,
                    });
                }
            }
        }
        peaks.sort_by(|a, b| b.votes.cmp(&a.votes));
        peaks
    }

    fn is_local_max(
        &self,
        t: usize,
        r: usize,
        votes: Votes,
        nms_rho: usize,
        nms_theta_deg: f32,
    ) -> bool {
        let theta = self.thetas_deg[t];
        let r_lo = r.saturating_sub(nms_rho);
        let r_hi = (r + nms_rho).min(self.rho_bins - 1);
        for (tt, &other_theta) in self.thetas_deg.iter().enumerate() {
            if (other_theta - theta).abs() > nms_theta_deg {
                continue;
            }
            for rr in r_lo..=r_hi {
                if tt == t && rr == r {
                    continue;
                }
                let other = self.votes(tt, rr);
                let earlier = (tt, rr) < (t, r);
                if other > votes || (other == votes && earlier) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_horizontal_line_peaks_at_ninety_degrees() {
        let mut mask = BinaryMask::new(60, 40);
        for x in 0..60 {
            mask.set(x, 17, true);
        }
        let mut acc = HoughAccumulator::new(60, 40, 15.0);
        acc.accumulate(&mask);
        let peaks = acc.peaks(30, 2, 2.0);
        let best = peaks.first().expect("peak");
        assert_eq!(best.theta_deg, 90.0);
        assert!((best.rho - 17.0).abs() < 0.5);
        assert_eq!(best.votes, 60);
    }

    #[test]
    fn diagonal_line_is_outside_bands() {
        let mut mask = BinaryMask::new(50, 50);
        for i in 0..50 {
            mask.set(i, i, true);
        }
        let mut acc = HoughAccumulator::new(50, 50, 15.0);
        acc.accumulate(&mask);
        assert!(acc.peaks(30, 2, 2.0).is_empty());
    }
}
