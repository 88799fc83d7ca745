//! I/O helpers for rasters and JSON.
//!
//! - `load_raster`: decode a PNG/JPEG/etc. into a gray or RGB [`RasterImage`].
//! - `save_grayscale_f32` / `save_mask`: write debug rasters as PNG.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::{BinaryMask, ImageF32, ImageRgbF32, ImageU8, ImageView, RasterImage};
use crate::error::{DigitizeError, Result};
use image::{GrayImage, Luma};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load an image from disk, keeping color when the source has it.
pub fn load_raster(path: &Path) -> Result<RasterImage> {
    let img = image::open(path).map_err(|source| DigitizeError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    if w == 0 || h == 0 {
        return Err(DigitizeError::EmptyImage {
            width: w,
            height: h,
        });
    }
    if img.color().has_color() {
        let rgb = img.into_rgb8();
        Ok(RasterImage::Rgb(ImageRgbF32::from_rgb8(w, h, rgb.as_raw())?))
    } else {
        let gray = img.into_luma8();
        Ok(RasterImage::Gray(ImageF32::from_u8(&ImageU8::packed(w, h, gray.as_raw()))))
    }
}

/// Save a float image to a grayscale PNG, clamping values in [0, 1].
pub fn save_grayscale_f32(image: &ImageF32, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut out = GrayImage::new(image.w as u32, image.h as u32);
    for y in 0..image.h {
        let row = image.row(y);
        for (x, &px) in row.iter().enumerate() {
            let v = (px * 255.0).clamp(0.0, 255.0);
            out.put_pixel(x as u32, y as u32, Luma([v as u8]));
        }
    }
    out.save(path).map_err(|source| DigitizeError::ImageSave {
        path: path.to_path_buf(),
        source,
    })
}

/// Save a mask as black lines on white.
pub fn save_mask(mask: &BinaryMask, path: &Path) -> Result<()> {
    let img = ImageF32 {
        w: mask.w,
        h: mask.h,
        stride: mask.w,
        data: mask
            .data
            .iter()
            .map(|&on| if on { 0.0 } else { 1.0 })
            .collect(),
    };
    save_grayscale_f32(&img, path)
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
