//! Separable smoothing filters applied before decimation.
use crate::image::{ImageF32, ImageView, ImageViewMut};

/// Trait implemented by separable 1D filters used for pyramid construction.
pub trait SeparableFilter {
    /// Return the 1D taps (in left-to-right order).
    fn taps(&self) -> &[f32];
}

/// Simple wrapper around a static filter kernel.
#[derive(Clone, Copy, Debug)]
pub struct StaticSeparableFilter {
    taps: &'static [f32],
}

impl Default for StaticSeparableFilter {
    fn default() -> Self {
        GAUSSIAN_5TAP
    }
}

impl StaticSeparableFilter {
    pub const fn new(taps: &'static [f32]) -> Self {
        Self { taps }
    }
}

impl SeparableFilter for StaticSeparableFilter {
    #[inline]
    fn taps(&self) -> &[f32] {
        self.taps
    }
}

/// Normalised 5-tap Gaussian filter `[1, 4, 6, 4, 1] / 16`.
pub const GAUSSIAN_5TAP: StaticSeparableFilter =
    StaticSeparableFilter::new(&[0.0625, 0.25, 0.375, 0.25, 0.0625]);

/// Convolve rows then columns with `filter`, clamping at the borders.
pub fn apply(filter: &dyn SeparableFilter, src: &ImageF32) -> ImageF32 {
    let taps = filter.taps();
    let (w, h) = (src.w, src.h);
    if taps.is_empty() || w == 0 || h == 0 {
        return src.clone();
    }
    let half = (taps.len() / 2) as isize;

    let mut tmp = ImageF32::new(w, h);
    for y in 0..h {
        let row = src.row(y);
        let dst = tmp.row_mut(y);
        for (x, out) in dst.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, &t) in taps.iter().enumerate() {
                let sx = (x as isize + k as isize - half).clamp(0, w as isize - 1) as usize;
                acc += t * row[sx];
            }
            *out = acc;
        }
    }

    let mut out = ImageF32::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, &t) in taps.iter().enumerate() {
                let sy = (y as isize + k as isize - half).clamp(0, h as isize - 1) as usize;
                acc += t * tmp.get(x, sy);
            }
            out.set(x, y, acc);
        }
    }
    out
}
