//! Tile split and merge for large scans.
//!
//! Tiles overlap by a fraction of their size so lines near a seam are seen
//! whole by at least one tile. Detection runs per tile in parallel; lines are
//! moved back to image coordinates and concatenated in tile order. A later
//! line is dropped when an earlier line of the same family sits within the
//! merge distance over most of their shared domain.
use super::calibration::line_spacing;
use super::multiscale::MultiScaleGridDetector;
use super::{DetectionMethod, GridDetection};
use crate::fit::GridLine;
use crate::image::ImageF32;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingOptions {
    pub multitile: bool,
    pub tiles_x: usize,
    pub tiles_y: usize,
    /// Overlap as a fraction of the nominal tile size.
    pub overlap: f32,
}

impl Default for TilingOptions {
    fn default() -> Self {
        Self {
            multitile: false,
            tiles_x: 2,
            tiles_y: 2,
            overlap: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub x0: usize,
    pub y0: usize,
    pub w: usize,
    pub h: usize,
}

/// Split `width × height` into overlapping tiles, row-major.
pub fn split_tiles(width: usize, height: usize, options: &TilingOptions) -> Vec<Tile> {
    let nx = options.tiles_x.max(1);
    let ny = options.tiles_y.max(1);
    let spans = |extent: usize, n: usize| -> Vec<(usize, usize)> {
        let base = extent as f32 / n as f32;
        let pad = (base * options.overlap.max(0.0) * 0.5).round() as usize;
        (0..n)
            .map(|i| {
                let start = (base * i as f32).round() as usize;
                let end = (base * (i + 1) as f32).round() as usize;
                let s = start.saturating_sub(pad);
                let e = (end + pad).min(extent);
                (s, e.saturating_sub(s))
            })
            .collect()
    };
    let xs = spans(width, nx);
    let ys = spans(height, ny);
    let mut tiles = Vec::with_capacity(nx * ny);
    for &(y0, h) in &ys {
        for &(x0, w) in &xs {
            if w > 0 && h > 0 {
                tiles.push(Tile { x0, y0, w, h });
            }
        }
    }
    tiles
}

/// Multi-scale detection per tile, merged into one detection.
pub fn detect_tiled(
    detector: &MultiScaleGridDetector,
    img: &ImageF32,
    options: &TilingOptions,
    merge_distance: f64,
    method: DetectionMethod,
) -> GridDetection {
    let tiles = split_tiles(img.w, img.h, options);
    let per_tile: Vec<_> = tiles
        .par_iter()
        .map(|tile| {
            let crop = img.crop(tile.x0, tile.y0, tile.w, tile.h);
            let mut result = detector.detect(&crop);
            let (dx, dy) = (tile.x0 as f64, tile.y0 as f64);
            for line in result
                .fine
                .horizontal
                .iter_mut()
                .chain(result.fine.vertical.iter_mut())
            {
                line.translate(dx, dy);
            }
            result
        })
        .collect();

    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();
    let mut fine_count = 0;
    let mut bold_count = 0;
    let mut demoted = 0;
    for result in per_tile {
        fine_count += result.fine.count();
        bold_count += result.bold.count();
        demoted += result.fine.demoted;
        merge_lines(&mut horizontal, result.fine.horizontal, merge_distance);
        merge_lines(&mut vertical, result.fine.vertical, merge_distance);
    }
    horizontal.sort_by(|a, b| a.position().total_cmp(&b.position()));
    vertical.sort_by(|a, b| a.position().total_cmp(&b.position()));
    let ratio = detector.ratio_check(fine_count, bold_count);
    debug!(
        "tiling: {} tiles -> h={} v={} (fine={} bold={})",
        tiles.len(),
        horizontal.len(),
        vertical.len(),
        fine_count,
        bold_count
    );
    GridDetection {
        method,
        spacing_x: line_spacing(&vertical, detector.spacing_rule()),
        spacing_y: line_spacing(&horizontal, detector.spacing_rule()),
        horizontal,
        vertical,
        validation_passed: ratio.passed,
        bold_lines: bold_count,
        demoted_lines: demoted,
    }
}

/// Append `incoming` to `kept`, skipping duplicates of already kept lines.
pub fn merge_lines(kept: &mut Vec<GridLine>, incoming: Vec<GridLine>, merge_distance: f64) {
    for line in incoming {
        let duplicate = kept
            .iter()
            .any(|k| k.orientation == line.orientation && same_line(k, &line, merge_distance));
        if !duplicate {
            kept.push(line);
        }
    }
}

fn same_line(a: &GridLine, b: &GridLine, merge_distance: f64) -> bool {
    let lo = a.domain.0.max(b.domain.0);
    let hi = a.domain.1.min(b.domain.1);
    let shorter = a.domain_len().min(b.domain_len()).max(1e-6);
    if hi - lo < 0.5 * shorter {
        return false;
    }
    let mid = 0.5 * (lo + hi);
    (a.eval(mid) - b.eval(mid)).abs() <= merge_distance
}
