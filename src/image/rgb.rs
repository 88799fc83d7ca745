//! Color input and the gray-or-color raster accepted by the pipeline.
use super::ImageF32;
use crate::error::{DigitizeError, Result};

/// Owned interleaved RGB image, channels in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRgbF32 {
    pub w: usize,
    pub h: usize,
    pub data: Vec<[f32; 3]>,
}

impl ImageRgbF32 {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![[0.0; 3]; w * h],
        }
    }

    /// Build from interleaved 8-bit RGB bytes.
    pub fn from_rgb8(w: usize, h: usize, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != w * h * 3 {
            return Err(DigitizeError::ChannelMismatch {
                width: w,
                height: h,
                channels: 3,
                len: bytes.len(),
            });
        }
        let data = bytes
            .chunks_exact(3)
            .map(|px| {
                [
                    px[0] as f32 / 255.0,
                    px[1] as f32 / 255.0,
                    px[2] as f32 / 255.0,
                ]
            })
            .collect();
        Ok(Self { w, h, data })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [f32; 3] {
        self.data[y * self.w + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, px: [f32; 3]) {
        self.data[y * self.w + x] = px;
    }

    /// Rec. 601 luma.
    pub fn luminance(&self) -> ImageF32 {
        ImageF32 {
            w: self.w,
            h: self.h,
            stride: self.w,
            data: self
                .data
                .iter()
                .map(|&[r, g, b]| 0.299 * r + 0.587 * g + 0.114 * b)
                .collect(),
        }
    }

    /// Red excess `r - (g + b) / 2`, clamped to `[0, 1]`.
    ///
    /// Printed ECG grids are red or pink while the trace is black, so this
    /// channel carries the grid and little of the trace.
    pub fn redness(&self) -> ImageF32 {
        ImageF32 {
            w: self.w,
            h: self.h,
            stride: self.w,
            data: self
                .data
                .iter()
                .map(|&[r, g, b]| (r - 0.5 * (g + b)).clamp(0.0, 1.0))
                .collect(),
        }
    }
}

/// Preprocessed raster handed to the digitizer.
#[derive(Clone, Debug, PartialEq)]
pub enum RasterImage {
    Gray(ImageF32),
    Rgb(ImageRgbF32),
}

impl RasterImage {
    pub fn width(&self) -> usize {
        match self {
            RasterImage::Gray(img) => img.w,
            RasterImage::Rgb(img) => img.w,
        }
    }

    pub fn height(&self) -> usize {
        match self {
            RasterImage::Gray(img) => img.h,
            RasterImage::Rgb(img) => img.h,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Non-empty with a packed buffer of exactly `width * height` pixels.
    pub fn is_well_formed(&self) -> bool {
        let (w, h) = (self.width(), self.height());
        let packed = match self {
            RasterImage::Gray(img) => img.stride == w && img.data.len() == w * h,
            RasterImage::Rgb(img) => img.data.len() == w * h,
        };
        !self.is_empty() && packed
    }

    /// Luminance plane (a copy for gray inputs).
    pub fn luma(&self) -> ImageF32 {
        match self {
            RasterImage::Gray(img) => img.clone(),
            RasterImage::Rgb(img) => img.luminance(),
        }
    }

    pub fn color(&self) -> Option<&ImageRgbF32> {
        match self {
            RasterImage::Gray(_) => None,
            RasterImage::Rgb(img) => Some(img),
        }
    }
}

impl From<ImageF32> for RasterImage {
    fn from(img: ImageF32) -> Self {
        RasterImage::Gray(img)
    }
}

impl From<ImageRgbF32> for RasterImage {
    fn from(img: ImageRgbF32) -> Self {
        RasterImage::Rgb(img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redness_separates_red_grid_from_black_trace() {
        let mut img = ImageRgbF32::new(3, 1);
        img.set(0, 0, [1.0, 1.0, 1.0]);
        img.set(1, 0, [0.9, 0.4, 0.4]);
        img.set(2, 0, [0.0, 0.0, 0.0]);
        let red = img.redness();
        assert_eq!(red.get(0, 0), 0.0);
        assert!((red.get(1, 0) - 0.5).abs() < 1e-6);
        assert_eq!(red.get(2, 0), 0.0);
    }

    #[test]
    fn mismatched_buffers_are_not_well_formed() {
        let short = ImageF32 {
            w: 4,
            h: 4,
            stride: 4,
            data: vec![0.5; 12],
        };
        assert!(!RasterImage::Gray(short).is_well_formed());
        let padded = ImageF32 {
            w: 4,
            h: 2,
            stride: 5,
            data: vec![0.5; 10],
        };
        assert!(!RasterImage::Gray(padded).is_well_formed());
        let mut rgb = ImageRgbF32::new(3, 3);
        rgb.data.pop();
        assert!(!RasterImage::Rgb(rgb).is_well_formed());
        assert!(RasterImage::Gray(ImageF32::new(3, 2)).is_well_formed());
    }

    #[test]
    fn from_rgb8_rejects_short_buffer() {
        let err = ImageRgbF32::from_rgb8(2, 2, &[0u8; 11]).unwrap_err();
        assert!(matches!(err, DigitizeError::ChannelMismatch { len: 11, .. }));
    }
}
