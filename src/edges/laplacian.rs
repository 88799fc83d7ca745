//! 4-neighbour Laplacian and its variance (focus measure).
use crate::image::{ImageF32, ImageView, ImageViewMut};

/// Laplacian `4·c − (n + s + e + w)` with replicated borders.
pub fn laplacian(l: &ImageF32) -> ImageF32 {
    let (w, h) = (l.w, l.h);
    let mut out = ImageF32::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }
    for y in 0..h {
        let up = l.row(y.saturating_sub(1));
        let mid = l.row(y);
        let down = l.row((y + 1).min(h - 1));
        let dst = out.row_mut(y);
        for x in 0..w {
            let left = mid[x.saturating_sub(1)];
            let right = mid[(x + 1).min(w - 1)];
            dst[x] = 4.0 * mid[x] - up[x] - down[x] - left - right;
        }
    }
    out
}

/// Variance of the Laplacian with intensities rescaled to `0..255`.
///
/// Thresholds on this value are resolution dependent; sharp scans of printed
/// paper typically land in the hundreds or more.
pub fn laplacian_variance(l: &ImageF32) -> f32 {
    let lap = laplacian(&l.map(|v| v * 255.0));
    let (_, std) = lap.mean_std();
    std * std
}
