//! Boolean raster used for line masks.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryMask {
    pub w: usize,
    pub h: usize,
    pub data: Vec<bool>,
}

impl BinaryMask {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![false; w * h],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.data[y * self.w + x]
    }

    /// Bounds-checked lookup on signed coordinates.
    #[inline]
    pub fn get_checked(&self, x: isize, y: isize) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.w
            && (y as usize) < self.h
            && self.data[y as usize * self.w + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: bool) {
        self.data[y * self.w + x] = v;
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Fraction of set pixels.
    pub fn density(&self) -> f32 {
        if self.data.is_empty() {
            0.0
        } else {
            self.count() as f32 / self.data.len() as f32
        }
    }

    /// Pixel-wise OR. Both masks must share dimensions.
    pub fn union(&self, other: &BinaryMask) -> BinaryMask {
        debug_assert_eq!((self.w, self.h), (other.w, other.h));
        BinaryMask {
            w: self.w,
            h: self.h,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| a || b)
                .collect(),
        }
    }

    /// Iterate `(x, y)` of set pixels in row-major order.
    pub fn iter_set(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let w = self.w.max(1);
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v)
            .map(move |(i, _)| (i % w, i / w))
    }
}
