//! Grayscale image pyramid with separable Gaussian blur and 2× decimation.
//!
//! The quality gates run their lightweight line count on a coarse level so
//! the check stays cheap on full-page scans. Each level is blurred with the
//! 5-tap Gaussian before every other pixel is kept; borders clamp.

pub mod filters;

use crate::image::{ImageF32, ImageView, ImageViewMut};
use filters::{apply as apply_filter, SeparableFilter, GAUSSIAN_5TAP};

#[derive(Clone, Debug)]
pub struct Pyramid {
    pub levels: Vec<ImageF32>,
}

impl Pyramid {
    /// Build `levels` levels (at least one) starting from `image`.
    pub fn build(image: &ImageF32, levels: usize) -> Self {
        Self::build_with_filter(image, levels, &GAUSSIAN_5TAP)
    }

    pub fn build_with_filter(
        image: &ImageF32,
        levels: usize,
        filter: &dyn SeparableFilter,
    ) -> Self {
        let levels = levels.max(1);
        let mut out = Vec::with_capacity(levels);
        out.push(image.clone());
        for _ in 1..levels {
            let Some(prev) = out.last() else { break };
            if prev.w < 2 || prev.h < 2 {
                break;
            }
            let blurred = apply_filter(filter, prev);
            let (nw, nh) = (prev.w.div_ceil(2), prev.h.div_ceil(2));
            let mut down = ImageF32::new(nw, nh);
            for y in 0..nh {
                let src_row = blurred.row((y * 2).min(blurred.h - 1));
                let dst_row = down.row_mut(y);
                for (x, dst_px) in dst_row.iter_mut().enumerate() {
                    *dst_px = src_row[(x * 2).min(blurred.w - 1)];
                }
            }
            out.push(down);
        }
        Self { levels: out }
    }

    /// Coarsest available level.
    pub fn coarsest(&self) -> &ImageF32 {
        self.levels.last().expect("pyramid has at least one level")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_halve_dimensions() {
        let img = ImageF32::filled(101, 64, 0.5);
        let pyr = Pyramid::build(&img, 3);
        assert_eq!(pyr.levels.len(), 3);
        assert_eq!((pyr.levels[1].w, pyr.levels[1].h), (51, 32));
        assert_eq!((pyr.coarsest().w, pyr.coarsest().h), (26, 16));
        assert!((pyr.coarsest().get(3, 3) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn tiny_image_stops_early() {
        let img = ImageF32::filled(1, 1, 1.0);
        assert_eq!(Pyramid::build(&img, 4).levels.len(), 1);
    }
}
