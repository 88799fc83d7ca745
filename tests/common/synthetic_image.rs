#![allow(dead_code)]

use ecg_digitizer::image::{ImageF32, ImageRgbF32};
use std::f32::consts::PI;

/// Fine grid coordinate: lines at `4 + 8i`, every fifth line 3 px wide.
pub fn is_grid_line(c: usize) -> bool {
    let i = ((c as f32 - 4.0) / 8.0).round().max(0.0) as usize;
    let d = c.abs_diff(4 + 8 * i);
    d == 0 || (i % 5 == 0 && d <= 1)
}

/// ECG paper with 8 px fine lines and 40 px bold lines.
pub fn grid_paper(width: usize, height: usize, line: f32, paper: f32) -> ImageF32 {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    ImageF32::from_fn(width, height, |x, y| {
        if is_grid_line(x) || is_grid_line(y) {
            line
        } else {
            paper
        }
    })
}

/// Red grid paper with the same geometry as [`grid_paper`].
pub fn red_grid_paper(width: usize, height: usize) -> ImageRgbF32 {
    let mut img = ImageRgbF32::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let px = if is_grid_line(x) || is_grid_line(y) {
                [0.95, 0.45, 0.45]
            } else {
                [1.0, 1.0, 1.0]
            };
            img.set(x, y, px);
        }
    }
    img
}

/// Isolated dots on a lattice, i.e. a grid whose lines were erased.
pub fn dot_grid(width: usize, height: usize, spacing: usize) -> ImageF32 {
    let half = spacing / 2;
    ImageF32::from_fn(width, height, |x, y| {
        if x % spacing == half && y % spacing == half {
            0.1
        } else {
            0.95
        }
    })
}

/// Row of a sinusoidal trace centred on `center_row`.
pub fn trace_row(x: usize, center_row: f32, amplitude_px: f32, period_px: f32) -> f32 {
    center_row - amplitude_px * (2.0 * PI * x as f32 / period_px).sin()
}

/// Draw a 2–3 px thick sinusoidal trace over columns `x0..x1`.
pub fn draw_sinusoid(
    img: &mut ImageF32,
    x0: usize,
    x1: usize,
    center_row: f32,
    amplitude_px: f32,
    period_px: f32,
    value: f32,
) {
    for x in x0..x1.min(img.w) {
        let row = trace_row(x - x0, center_row, amplitude_px, period_px);
        for y in 0..img.h {
            if (y as f32 - row).abs() <= 1.0 {
                img.set(x, y, value);
            }
        }
    }
}

/// Pixel samples of one horizontal line under barrel distortion: the line at
/// `y0` sags by `sag` pixels towards the image edges, rounded to whole rows.
pub fn barrel_line(width: usize, y0: f32, sag: f32) -> Vec<[f32; 2]> {
    let cx = (width as f32 - 1.0) * 0.5;
    (0..width)
        .map(|x| {
            let u = (x as f32 - cx) / cx;
            [x as f32, (y0 + sag * u * u).round()]
        })
        .collect()
}

/// Pearson correlation of two equally long series.
pub fn correlation(a: &[f32], b: &[f32]) -> f64 {
    assert_eq!(a.len(), b.len(), "series must have equal length");
    let n = a.len() as f64;
    let ma = a.iter().map(|&v| v as f64).sum::<f64>() / n;
    let mb = b.iter().map(|&v| v as f64).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let (dx, dy) = (x as f64 - ma, y as f64 - mb);
        cov += dx * dy;
        va += dx * dx;
        vb += dy * dy;
    }
    if va <= 0.0 || vb <= 0.0 {
        return 0.0;
    }
    cov / (va * vb).sqrt()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
