//! Grid line finder: Hough segments → orientation buckets → line clusters.
//!
//! The input is a binary line mask (dark pixels set). The mask is thinned
//! with the strategy chosen at construction, voted into a band-limited Hough
//! accumulator, and every peak is walked across the image to cut it into
//! supported segments (gaps up to `max_gap` pixels are bridged). Segments
//! are bucketed by angle, then clustered by midpoint y (horizontal) or
//! midpoint x (vertical). Each cluster carries the mask pixels that
//! supported its segments, subsampled every `resample_step` pixels, as the
//! point cloud handed to the polynomial fitter.
use super::cluster::{cluster_1d, Obs};
use super::hough::{HoughAccumulator, HoughPeak};
use crate::angle::{classify_angle, segment_angle_deg, Orientation};
use crate::image::{BinaryMask, ImageF32};
use crate::morphology::{binarize_auto, Thinning, ThinningKind};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LineFinderOptions {
    /// Fixed binarisation threshold; Otsu when unset.
    pub binarize_threshold: Option<f32>,
    /// Half-width of the horizontal/vertical angle bands (degrees).
    pub band_deg: f32,
    /// Minimum accumulator votes for a Hough peak.
    pub hough_min_votes: u32,
    /// Non-maximum suppression radius in rho bins.
    pub nms_rho: usize,
    /// Non-maximum suppression radius in degrees.
    pub nms_theta: f32,
    /// Minimum accepted segment length in pixels.
    pub min_segment_length: f32,
    /// Largest gap (pixels) bridged while walking a peak.
    pub max_gap: f32,
    /// Perpendicular search radius (pixels) while walking a peak.
    pub trace_tolerance: usize,
    /// Midpoint distance (pixels) that chains segments into one line.
    pub cluster_threshold: f32,
    /// Spacing (pixels) of the points kept per segment.
    pub resample_step: f32,
    pub thinning: ThinningKind,
}

impl Default for LineFinderOptions {
    fn default() -> Self {
        Self {
            binarize_threshold: None,
            band_deg: 15.0,
            hough_min_votes: 40,
            nms_rho: 2,
            nms_theta: 2.0,
            min_segment_length: 30.0,
            max_gap: 5.0,
            trace_tolerance: 1,
            cluster_threshold: 4.0,
            resample_step: 2.0,
            thinning: ThinningKind::default(),
        }
    }
}

/// Segment cut from a Hough peak.
#[derive(Clone, Debug, Serialize)]
pub struct LineSegment {
    pub p0: [f32; 2],
    pub p1: [f32; 2],
    pub votes: u32,
    pub orientation: Orientation,
    /// Mask pixels that supported the segment, in walking order.
    #[serde(skip)]
    pub support: Vec<[f32; 2]>,
}

impl LineSegment {
    pub fn length(&self) -> f32 {
        let dx = self.p1[0] - self.p0[0];
        let dy = self.p1[1] - self.p0[1];
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self) -> [f32; 2] {
        [
            (self.p0[0] + self.p1[0]) * 0.5,
            (self.p0[1] + self.p1[1]) * 0.5,
        ]
    }

    /// Coordinate used for clustering: midpoint y for horizontal, x for vertical.
    pub fn representative(&self) -> f32 {
        let m = self.midpoint();
        match self.orientation {
            Orientation::Horizontal => m[1],
            Orientation::Vertical => m[0],
        }
    }
}

/// Point cloud of one candidate grid line.
#[derive(Clone, Debug, Serialize)]
pub struct LineCluster {
    pub orientation: Orientation,
    /// Length-weighted mean representative coordinate.
    pub position: f32,
    pub segment_count: usize,
    pub total_length: f32,
    pub points: Vec<[f32; 2]>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct LineFinderOutput {
    pub segments: Vec<LineSegment>,
    pub horizontal: Vec<LineCluster>,
    pub vertical: Vec<LineCluster>,
    pub discarded_segments: usize,
}

impl LineFinderOutput {
    pub fn clusters(&self, orientation: Orientation) -> &[LineCluster] {
        match orientation {
            Orientation::Horizontal => &self.horizontal,
            Orientation::Vertical => &self.vertical,
        }
    }
}

pub struct GridLineFinder {
    options: LineFinderOptions,
    thinning: Box<dyn Thinning>,
}

impl GridLineFinder {
    pub fn new(options: LineFinderOptions) -> Self {
        let thinning = options.thinning.build();
        Self { options, thinning }
    }

    pub fn options(&self) -> &LineFinderOptions {
        &self.options
    }

    /// Binarise a grayscale image and run [`GridLineFinder::find`] on it.
    pub fn find_in_image(&self, img: &ImageF32) -> LineFinderOutput {
        self.find(&binarize_auto(img, self.options.binarize_threshold))
    }

    /// Detect segments and cluster them into candidate lines.
    pub fn find(&self, mask: &BinaryMask) -> LineFinderOutput {
        if mask.w == 0 || mask.h == 0 {
            return LineFinderOutput::default();
        }
        let thin = self.thinning.thin(mask);
        let mut acc = HoughAccumulator::new(mask.w, mask.h, self.options.band_deg);
        acc.accumulate(&thin);
        let peaks = acc.peaks(
            self.options.hough_min_votes,
            self.options.nms_rho,
            self.options.nms_theta,
        );

        let mut segments = Vec::new();
        let mut discarded = 0usize;
        for peak in &peaks {
            for seg in self.walk_peak(&thin, peak) {
                let angle = segment_angle_deg(seg.0, seg.1);
                match classify_angle(angle, self.options.band_deg) {
                    Some(orientation) => segments.push(LineSegment {
                        p0: seg.0,
                        p1: seg.1,
                        votes: peak.votes,
                        orientation,
                        support: seg.2,
                    }),
                    None => discarded += 1,
                }
            }
        }

        let horizontal = self.cluster(&segments, Orientation::Horizontal);
        let vertical = self.cluster(&segments, Orientation::Vertical);
        debug!(
            "line finder ({}): peaks={} segments={} discarded={} clusters h={} v={}",
            self.thinning.name(),
            peaks.len(),
            segments.len(),
            discarded,
            horizontal.len(),
            vertical.len()
        );
        LineFinderOutput {
            segments,
            horizontal,
            vertical,
            discarded_segments: discarded,
        }
    }

    /// Walk the infinite line of `peak` through the mask and cut supported runs.
    fn walk_peak(
        &self,
        mask: &BinaryMask,
        peak: &HoughPeak,
    ) -> Vec<([f32; 2], [f32; 2], Vec<[f32; 2]>)> {
        let n = peak.normal();
        let d = [-n[1], n[0]];
        let base = [peak.rho * n[0], peak.rho * n[1]];
        let reach = ((mask.w * mask.w + mask.h * mask.h) as f32).sqrt().ceil() as i32;
        let tol = self.options.trace_tolerance as i32;

        let mut out = Vec::new();
        let mut run: Option<(f32, f32, Vec<[f32; 2]>)> = None;
        for ti in -reach..=reach {
            let t = ti as f32;
            let px = base[0] + t * d[0];
            let py = base[1] + t * d[1];
            let hit = self.hit_near(mask, px, py, n, tol);
            match (hit, run.as_mut()) {
                (Some(p), Some((_, last, support))) => {
                    *last = t;
                    support.push(p);
                }
                (Some(p), None) => run = Some((t, t, vec![p])),
                (None, Some((_, last, _))) if t - *last > self.options.max_gap => {
                    if let Some(done) = run.take() {
                        self.close_run(done, base, d, &mut out);
                    }
                }
                _ => {}
            }
        }
        if let Some(done) = run.take() {
            self.close_run(done, base, d, &mut out);
        }
        out
    }

    fn hit_near(
        &self,
        mask: &BinaryMask,
        px: f32,
        py: f32,
        n: [f32; 2],
        tol: i32,
    ) -> Option<[f32; 2]> {
        // Centre first, then alternate outwards along the normal.
        for k in 0..=tol {
            for sign in [1, -1] {
                if k == 0 && sign < 0 {
                    continue;
                }
                let off = (k * sign) as f32;
                let x = (px + off * n[0]).round() as isize;
                let y = (py + off * n[1]).round() as isize;
                if mask.get_checked(x, y) {
                    return Some([x as f32, y as f32]);
                }
            }
        }
        None
    }

    fn close_run(
        &self,
        (t0, t1, support): (f32, f32, Vec<[f32; 2]>),
        base: [f32; 2],
        d: [f32; 2],
        out: &mut Vec<([f32; 2], [f32; 2], Vec<[f32; 2]>)>,
    ) {
        if t1 - t0 < self.options.min_segment_length {
            return;
        }
        let p0 = [base[0] + t0 * d[0], base[1] + t0 * d[1]];
        let p1 = [base[0] + t1 * d[0], base[1] + t1 * d[1]];
        out.push((p0, p1, support));
    }

    fn cluster(&self, segments: &[LineSegment], orientation: Orientation) -> Vec<LineCluster> {
        let obs: Vec<Obs> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.orientation == orientation)
            .map(|(index, s)| Obs {
                index,
                param: s.representative(),
                strength: s.length(),
            })
            .collect();
        let groups = cluster_1d(
            obs,
            self.options.cluster_threshold,
            self.options.min_segment_length,
        );

        let step = self.options.resample_step.max(1.0);
        groups
            .into_iter()
            .map(|group| {
                let total_length: f32 = group.iter().map(|o| o.strength).sum();
                let position =
                    group.iter().map(|o| o.param * o.strength).sum::<f32>() / total_length.max(1e-6);
                let mut points = Vec::new();
                for o in &group {
                    let seg = &segments[o.index];
                    let stride = step.round().max(1.0) as usize;
                    points.extend(seg.support.iter().step_by(stride).copied());
                    if let Some(&last) = seg.support.last() {
                        if seg.support.len() % stride != 1 {
                            points.push(last);
                        }
                    }
                }
                LineCluster {
                    orientation,
                    position,
                    segment_count: group.len(),
                    total_length,
                    points,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_mask(w: usize, h: usize, spacing: usize) -> BinaryMask {
        let mut m = BinaryMask::new(w, h);
        for y in 0..h {
            for x in 0..w {
                if x % spacing == 5 || y % spacing == 5 {
                    m.set(x, y, true);
                }
            }
        }
        m
    }

    #[test]
    fn finds_every_line_of_a_clean_grid() {
        let mask = grid_mask(160, 120, 20);
        let finder = GridLineFinder::new(LineFinderOptions::default());
        let out = finder.find(&mask);
        assert_eq!(out.vertical.len(), 8);
        assert_eq!(out.horizontal.len(), 6);
        for (i, c) in out.horizontal.iter().enumerate() {
            assert!((c.position - (5 + 20 * i) as f32).abs() < 1.0, "{:?}", c.position);
            assert!(c.points.len() > 40);
        }
    }

    #[test]
    fn grayscale_input_is_binarised_first() {
        let img = ImageF32::from_fn(160, 120, |x, y| {
            if x % 20 == 5 || y % 20 == 5 {
                0.2
            } else {
                0.9
            }
        });
        let finder = GridLineFinder::new(LineFinderOptions::default());
        let from_image = finder.find_in_image(&img);
        let from_mask = finder.find(&grid_mask(160, 120, 20));
        assert_eq!(from_image.vertical.len(), from_mask.vertical.len());
        assert_eq!(from_image.horizontal.len(), from_mask.horizontal.len());
    }

    #[test]
    fn empty_mask_has_no_lines() {
        let finder = GridLineFinder::new(LineFinderOptions::default());
        let out = finder.find(&BinaryMask::new(50, 50));
        assert!(out.segments.is_empty());
        assert!(out.horizontal.is_empty() && out.vertical.is_empty());
    }

    #[test]
    fn short_marks_are_not_lines() {
        let mut mask = BinaryMask::new(100, 100);
        for x in 10..20 {
            mask.set(x, 50, true);
        }
        let finder = GridLineFinder::new(LineFinderOptions {
            hough_min_votes: 5,
            ..Default::default()
        });
        let out = finder.find(&mask);
        assert!(out.horizontal.is_empty());
    }
}
