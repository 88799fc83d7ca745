//! Binarisation, directional openings and thinning for grid line masks.
//!
//! Grid lines are dark on light paper, so every mask here marks *dark*
//! pixels. Openings use 1D line structuring elements, for which an opening
//! reduces to keeping the runs at least as long as the element; that keeps
//! both passes of the multi-scale detector linear in the pixel count.
use crate::image::{BinaryMask, ImageF32};
use serde::{Deserialize, Serialize};

/// Otsu threshold over a 256-bin histogram of `[0, 1]` intensities.
///
/// Returns `None` when the image is (numerically) constant.
pub fn otsu_threshold(img: &ImageF32) -> Option<f32> {
    let (lo, hi) = img.min_max();
    if !(hi - lo > 1e-3) {
        return None;
    }
    let mut hist = [0u64; 256];
    for &v in &img.data {
        let bin = (v.clamp(0.0, 1.0) * 255.0).round() as usize;
        hist[bin] += 1;
    }
    let total = img.data.len() as f64;
    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut best_t = 0usize;
    let mut best_var = -1.0f64;
    let mut w_b = 0.0f64;
    let mut sum_b = 0.0f64;
    for (t, &count) in hist.iter().enumerate() {
        w_b += count as f64;
        if w_b == 0.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f == 0.0 {
            break;
        }
        sum_b += t as f64 * count as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_all - sum_b) / w_f;
        let between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if between > best_var {
            best_var = between;
            best_t = t;
        }
    }
    Some((best_t as f32 + 0.5) / 255.0)
}

/// Mark pixels strictly darker than `threshold`.
pub fn binarize_dark(img: &ImageF32, threshold: f32) -> BinaryMask {
    BinaryMask {
        w: img.w,
        h: img.h,
        data: img.data.iter().map(|&v| v < threshold).collect(),
    }
}

/// Binarise with an explicit threshold or Otsu; a constant image yields an
/// empty mask.
pub fn binarize_auto(img: &ImageF32, threshold: Option<f32>) -> BinaryMask {
    match threshold.or_else(|| otsu_threshold(img)) {
        Some(t) => binarize_dark(img, t),
        None => BinaryMask::new(img.w, img.h),
    }
}

/// Opening with a horizontal line element of `len` pixels.
pub fn open_horizontal(mask: &BinaryMask, len: usize) -> BinaryMask {
    let mut out = BinaryMask::new(mask.w, mask.h);
    if len <= 1 {
        return mask.clone();
    }
    for y in 0..mask.h {
        let mut x = 0;
        while x < mask.w {
            if !mask.get(x, y) {
                x += 1;
                continue;
            }
            let start = x;
            while x < mask.w && mask.get(x, y) {
                x += 1;
            }
            if x - start >= len {
                for xx in start..x {
                    out.set(xx, y, true);
                }
            }
        }
    }
    out
}

/// Opening with a vertical line element of `len` pixels.
pub fn open_vertical(mask: &BinaryMask, len: usize) -> BinaryMask {
    let mut out = BinaryMask::new(mask.w, mask.h);
    if len <= 1 {
        return mask.clone();
    }
    for x in 0..mask.w {
        let mut y = 0;
        while y < mask.h {
            if !mask.get(x, y) {
                y += 1;
                continue;
            }
            let start = y;
            while y < mask.h && mask.get(x, y) {
                y += 1;
            }
            if y - start >= len {
                for yy in start..y {
                    out.set(x, yy, true);
                }
            }
        }
    }
    out
}

/// Thinning strategy applied to line masks before the Hough transform.
///
/// Thick (bold) lines otherwise vote for several adjacent `rho` bins.
pub trait Thinning: Send + Sync {
    fn name(&self) -> &'static str;
    fn thin(&self, mask: &BinaryMask) -> BinaryMask;
}

/// Selector for the thinning strategy, resolved once per line finder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinningKind {
    #[default]
    ZhangSuen,
    Morphological,
    None,
}

impl ThinningKind {
    pub fn build(self) -> Box<dyn Thinning> {
        match self {
            ThinningKind::ZhangSuen => Box::new(ZhangSuenThinning::default()),
            ThinningKind::Morphological => Box::new(MorphologicalThinning::default()),
            ThinningKind::None => Box::new(NoThinning),
        }
    }
}

/// Classic two-subiteration Zhang–Suen skeletonisation.
#[derive(Clone, Copy, Debug)]
pub struct ZhangSuenThinning {
    pub max_iterations: usize,
}

impl Default for ZhangSuenThinning {
    fn default() -> Self {
        Self { max_iterations: 64 }
    }
}

impl Thinning for ZhangSuenThinning {
    fn name(&self) -> &'static str {
        "zhang_suen"
    }

    fn thin(&self, mask: &BinaryMask) -> BinaryMask {
        let mut img = mask.clone();
        let (w, h) = (img.w as isize, img.h as isize);
        let mut to_clear = Vec::new();
        for _ in 0..self.max_iterations {
            let mut changed = false;
            for step in 0..2 {
                to_clear.clear();
                for y in 0..h {
                    for x in 0..w {
                        if !img.get(x as usize, y as usize) {
                            continue;
                        }
                        // P2..P9 clockwise from north.
                        let p = [
                            img.get_checked(x, y - 1),
                            img.get_checked(x + 1, y - 1),
                            img.get_checked(x + 1, y),
                            img.get_checked(x + 1, y + 1),
                            img.get_checked(x, y + 1),
                            img.get_checked(x - 1, y + 1),
                            img.get_checked(x - 1, y),
                            img.get_checked(x - 1, y - 1),
                        ];
                        let b = p.iter().filter(|&&v| v).count();
                        if !(2..=6).contains(&b) {
                            continue;
                        }
                        let a = (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count();
                        if a != 1 {
                            continue;
                        }
                        let (c1, c2) = if step == 0 {
                            (p[0] && p[2] && p[4], p[2] && p[4] && p[6])
                        } else {
                            (p[0] && p[2] && p[6], p[0] && p[4] && p[6])
                        };
                        if !c1 && !c2 {
                            to_clear.push((x as usize, y as usize));
                        }
                    }
                }
                for &(x, y) in &to_clear {
                    img.set(x, y, false);
                }
                changed |= !to_clear.is_empty();
            }
            if !changed {
                break;
            }
        }
        img
    }
}

/// Keeps the centre pixel of every run no longer than `max_thickness`, in
/// both directions. Runs longer than that follow a line rather than cross it.
///
/// Cheaper than Zhang–Suen and adequate for axis-aligned grids.
#[derive(Clone, Copy, Debug)]
pub struct MorphologicalThinning {
    pub max_thickness: usize,
}

impl Default for MorphologicalThinning {
    fn default() -> Self {
        Self { max_thickness: 8 }
    }
}

impl Thinning for MorphologicalThinning {
    fn name(&self) -> &'static str {
        "morphological"
    }

    fn thin(&self, mask: &BinaryMask) -> BinaryMask {
        let mut out = BinaryMask::new(mask.w, mask.h);
        for y in 0..mask.h {
            let mut x = 0;
            while x < mask.w {
                if !mask.get(x, y) {
                    x += 1;
                    continue;
                }
                let start = x;
                while x < mask.w && mask.get(x, y) {
                    x += 1;
                }
                if x - start <= self.max_thickness {
                    out.set((start + x - 1) / 2, y, true);
                }
            }
        }
        for x in 0..mask.w {
            let mut y = 0;
            while y < mask.h {
                if !mask.get(x, y) {
                    y += 1;
                    continue;
                }
                let start = y;
                while y < mask.h && mask.get(x, y) {
                    y += 1;
                }
                if y - start <= self.max_thickness {
                    out.set(x, (start + y - 1) / 2, true);
                }
            }
        }
        out
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoThinning;

impl Thinning for NoThinning {
    fn name(&self) -> &'static str {
        "none"
    }

    fn thin(&self, mask: &BinaryMask) -> BinaryMask {
        mask.clone()
    }
}
